// Shared prompt fragments. Each tailoring step keeps its own templates in
// tailoring/prompts.rs; this file holds the pieces every step appends.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every rewriting prompt.
pub const TRUTHFULNESS_INSTRUCTION: &str = "\
    CRITICAL: Only use facts present in the candidate's CV data given above. \
    Do NOT invent employers, projects, institutions, dates, metrics or technologies. \
    If the job asks for something the CV does not show, leave it out.";

/// Appended to prompts that return entries of an existing section.
pub const SCHEMA_INSTRUCTION: &str = "\
    Keep every entry's identifying fields (company, position, institution, degree, \
    area, name, dates) exactly as given. Return the same JSON shape you received.";

/// Joins a step's system prompt with the JSON-only fragment.
pub fn system_prompt(role: &str) -> String {
    format!("{role}\n\n{JSON_ONLY_SYSTEM}")
}
