//! Prompt text and the structured-output schema for course plans.

use serde_json::{json, Value};

use crate::course::{CourseInput, CoursePlan, CourseSection};

/// Tone used for section content when the input carries no restrictions.
const DEFAULT_TONE: &str = "Professional and encouraging";

/// Closing instruction shared by both plan prompts.
const JSON_ONLY: &str = "Your entire output MUST be a valid JSON object matching the provided schema. Do not include any explanatory text, markdown formatting, or code fences.";

/// Response schema for plan generation and revision.
///
/// Uses the OpenAPI subset understood by the Gemini `responseSchema` field.
#[must_use]
pub fn course_plan_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "Detailed and engaging title for the course."
            },
            "audience": {
                "type": "STRING",
                "description": "A more detailed description of the target audience."
            },
            "duration": {
                "type": "STRING",
                "description": "Estimated total duration to complete the course (e.g., '6 hours')."
            },
            "sections": {
                "type": "ARRAY",
                "description": "An array of course sections.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": {
                            "type": "STRING",
                            "description": "A unique identifier for the section, e.g., 'section_1'."
                        },
                        "title": {
                            "type": "STRING",
                            "description": "The title of this course section."
                        },
                        "description": {
                            "type": "STRING",
                            "description": "A brief one-sentence summary of what this section covers."
                        },
                        "objectives": {
                            "type": "ARRAY",
                            "description": "A list of specific learning objectives for this section.",
                            "items": { "type": "STRING" }
                        },
                        "subsections": {
                            "type": "ARRAY",
                            "description": "An array of subsections within this section.",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "title": { "type": "STRING" },
                                    "description": { "type": "STRING" }
                                },
                                "required": ["title", "description"]
                            }
                        }
                    },
                    "required": ["id", "title", "description", "objectives", "subsections"]
                }
            }
        },
        "required": ["title", "audience", "duration", "sections"]
    })
}

fn requirements(input: &CourseInput) -> String {
    format!(
        "- Topic: {}\n- Learning Objective: {}\n- Target Audience: {}\n- Restrictions/Details: {}",
        input.topic,
        input.objective,
        input.audience,
        input.restrictions_text().unwrap_or("None"),
    )
}

/// Prompt for the first plan of a session.
#[must_use]
pub fn plan_prompt(input: &CourseInput) -> String {
    format!(
        "You are an expert instructional designer tasked with creating a comprehensive course outline.
Based on the following user requirements, generate a structured course plan.

Requirements:
{requirements}

The course plan should be divided into logical sections. Each section must have:
- A unique 'id' (e.g., \"section_1\").
- A clear 'title'.
- A 'description' briefly explaining what the section covers.
- A list of specific 'objectives' for that section.
- An array of 'subsections', each with a 'title' and a brief 'description'.

{JSON_ONLY}",
        requirements = requirements(input),
    )
}

/// Prompt for revising `previous` according to `feedback`.
///
/// The previous plan is embedded as pretty-printed JSON.
#[must_use]
pub fn revision_prompt(input: &CourseInput, previous: &CoursePlan, feedback: &str) -> String {
    let previous_json =
        serde_json::to_string_pretty(previous).unwrap_or_else(|_| String::from("{}"));

    format!(
        "You are an expert instructional designer tasked with revising a course outline based on user feedback.

Original Requirements:
{requirements}

Previous Course Plan (JSON):
{previous_json}

User Feedback for Revision:
\"{feedback}\"

Instructions:
- Analyze the feedback and regenerate the entire course plan to incorporate the user's suggestions.
- Maintain the same overall structure and goals unless the feedback directs otherwise.
- For example, if the user asks for a new practical section, add one and adjust the other sections if necessary.
- Ensure all section IDs are unique and sequential (e.g., 'section_1', 'section_2', etc.).

{JSON_ONLY}",
        requirements = requirements(input),
        feedback = feedback.trim(),
    )
}

/// Prompt for the markdown body of one section.
#[must_use]
pub fn section_prompt(input: &CourseInput, section: &CourseSection, language: &str) -> String {
    let subsections = section
        .subsections
        .iter()
        .map(|s| s.title.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are an expert content writer and subject matter expert, creating educational material.
Your task is to write the detailed content for a specific section of a larger course.

COURSE CONTEXT:
- Course Topic: {topic}
- Target Audience: {audience}
- Overall Tone/Restrictions: {tone}

SECTION TO WRITE:
- Section Title: \"{title}\"
- Section Objectives: {objectives}
- Subsections to cover: {subsections}

INSTRUCTIONS:
- Write detailed, engaging, and practical content for this section in {language}.
- Use Markdown for formatting (e.g., # for H1, ## for H2, lists, bold, italics, and ``` for code blocks).
- If the topic involves code (like Python, JavaScript, etc.), provide clear, well-commented code examples.
- Structure the content logically, using the subsections as a guide for H2 or H3 headings.
- Ensure the content directly addresses the specified learning objectives.
- Do NOT repeat the main section title as an H1 heading. Start the content directly, perhaps with a brief introduction.
- Your output should be ONLY the markdown content for this single section.",
        topic = input.topic,
        audience = input.audience,
        tone = input.restrictions_text().unwrap_or(DEFAULT_TONE),
        title = section.title,
        objectives = section.objectives.join(", "),
    )
}
