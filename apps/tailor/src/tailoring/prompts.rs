// Prompt templates for the tailoring steps. `{placeholder}` markers are
// replaced before sending; the shared JSON-only and truthfulness fragments
// come from llm_client::prompts.

// ─── Job advertisement ───────────────────────────────────────────────────────

pub const PARSE_JOB_AD_SYSTEM: &str =
    "You are an expert job advertisement analyst. Extract key information and return it as JSON.";

/// Replace `{job_ad}`.
pub const PARSE_JOB_AD_TEMPLATE: &str = r#"Analyze the following job advertisement.

Job Advertisement:
{job_ad}

Return a JSON object with these keys:
- "essential_requirements": list of must-have skills and qualifications
- "desirable_requirements": list of nice-to-have skills and qualifications
- "key_technologies": list of specific technologies, tools and platforms mentioned
- "soft_skills": list of interpersonal and communication skills
- "company_culture": short description of company values and culture
- "role_focus": list of primary focus areas of the role
- "experience_level": required years or seniority
- "education_requirements": list of required degrees and fields
- "industry_domain": industry or domain focus (e.g. healthcare, finance, tech)
- "location": job location
- "work_arrangement": remote, hybrid or on-site
- "tone_indicators": list such as formal, technical, business-focused"#;

// ─── Section order ───────────────────────────────────────────────────────────

pub const REORDER_SYSTEM: &str =
    "You are an expert resume strategist. Decide which CV sections to show and in what order.";

/// Replace `{sections}`, `{requirements}`.
pub const REORDER_TEMPLATE: &str = r#"The CV has these sections (key: number of entries):
{sections}

Job requirements:
{requirements}

Order the sections so the most relevant evidence for this role comes first.
You may drop sections that add nothing for this role, except professional_summary,
experience and skills, which must always stay.

Return a JSON object with:
- "optimized_sections": list of section keys to keep, in the new order
- "removed_sections": list of section keys to drop (may be empty)
- "reasoning": object mapping section keys to a one-line reason"#;

// ─── Summary ─────────────────────────────────────────────────────────────────

pub const SUMMARY_SYSTEM: &str = "You are an expert resume writer who prioritizes TRUTHFULNESS \
    above all else. Never claim professional experience in domains where the candidate only has \
    academic or project experience, and only name technologies listed in their skills section.";

/// Replace `{summary}`, `{skills}`, `{experience}`, `{projects}`, `{education}`, `{requirements}`.
pub const SUMMARY_TEMPLATE: &str = r#"Rewrite the candidate's professional summary for this role.

Current summary:
{summary}

Skills:
{skills}

Experience:
{experience}

Projects:
{projects}

Education:
{education}

Job requirements:
{requirements}

Rules:
- 40 to 70 words, 2 to 4 sentences
- Only mention technologies that appear in the skills section above
- Lead with the candidate's actual professional background

Return a JSON object with:
- "professional_summary": list of strings (each string one or more sentences)
- "changes_made": list of short notes"#;

// ─── Experience ──────────────────────────────────────────────────────────────

pub const EXPERIENCE_SYSTEM: &str = "You are an expert resume writer. Tailor experience \
    sections to highlight relevant achievements and skills matching job requirements.";

/// Replace `{experience}`, `{requirements}`.
pub const EXPERIENCE_TEMPLATE: &str = r#"Current experience entries:
{experience}

Job requirements:
{requirements}

Instructions:
1. Order entries by relevance to the role
2. Rewrite highlights to emphasise relevant achievements, using the job's vocabulary naturally
3. Remove or de-emphasise irrelevant highlights
4. Never add employers, positions or technologies that are not already in the entry

Return a JSON object with:
- "reordered_experience": list of entries, each with "company", "position" and "highlights"
- "changes_summary": brief explanation of reordering and highlight changes"#;

// ─── Projects ────────────────────────────────────────────────────────────────

pub const PROJECTS_SYSTEM: &str = "You are an expert resume writer. Tailor project sections \
    to showcase relevant technical skills and achievements.";

/// Replace `{projects}`, `{requirements}`, `{cap}`.
pub const PROJECTS_TEMPLATE: &str = r#"Current projects:
{projects}

Job requirements:
{requirements}

Instructions:
1. Select at most {cap} projects, most relevant first
2. Rewrite each selected project's summary and highlights for this role
3. Keep project names exactly as given; never invent projects

Return a JSON object with:
- "tailored_projects": list of entries, each with "name", "summary" and "highlights"
- "changes_summary": brief explanation of selection and content changes"#;

// ─── Education ───────────────────────────────────────────────────────────────

pub const EDUCATION_SYSTEM: &str = "You are an expert resume writer. Tailor education section \
    highlights only; keep all other fields unchanged and maintain the exact structure.";

/// Replace `{education}`, `{requirements}`, `{limit}`.
pub const EDUCATION_TEMPLATE: &str = r#"Current education entries:
{education}

Job requirements:
{requirements}

Instructions:
1. Keep the entries in the same order with institution, area, degree and dates unchanged
2. For each entry choose at most {limit} highlights (coursework, thesis, awards) most relevant to the role

Return a JSON object with:
- "tailored_education": list of entries with the SAME structure and optimised highlights
- "changes_summary": brief explanation of highlight selection"#;

// ─── Skills ──────────────────────────────────────────────────────────────────

pub const SKILLS_SYSTEM: &str = "You are an expert resume writer. Tailor skills sections to \
    match job requirements while maintaining truthfulness.";

/// Replace `{skills}`, `{evidence}`, `{requirements}`.
pub const SKILLS_TEMPLATE: &str = r#"Current skills:
{skills}

Highlights from experience and projects (evidence):
{evidence}

Job requirements:
{requirements}

Instructions:
1. Reorder skill categories by relevance to the job
2. Within each category, put the most relevant skills first and drop irrelevant ones
3. Only keep skills the candidate already lists or clearly uses in the evidence above
4. Match the job's naming where it refers to the same skill

Return a JSON object with:
- "tailored_skills": list of {"label": ..., "details": "comma, separated, skills"}
- "changes_summary": brief explanation of skills reordered or removed"#;

// ─── Certifications & extracurricular ────────────────────────────────────────

pub const CERTIFICATIONS_SYSTEM: &str = "You are an expert resume writer. Select and \
    prioritize the most relevant certifications for the target role.";

/// Replace `{items}`, `{requirements}`.
pub const CERTIFICATIONS_TEMPLATE: &str = r#"Current certifications:
{items}

Job requirements:
{requirements}

Keep every certification that supports the role, most relevant first. Copy kept items
exactly as written.

Return a JSON object with:
- "relevant_certifications": list of kept certifications, in order of relevance
- "removed_certifications": list of removed certifications
- "changes_summary": brief explanation of the selection"#;

pub const EXTRACURRICULAR_SYSTEM: &str = "You are an expert resume writer. Be highly selective \
    about extracurricular activities; only include those that directly add professional value.";

/// Replace `{items}`, `{requirements}`.
pub const EXTRACURRICULAR_TEMPLATE: &str = r#"Current extracurricular activities:
{items}

Job requirements:
{requirements}

Keep only activities that show skills this role values. Copy kept items exactly as written.
An empty list is a valid answer.

Return a JSON object with:
- "relevant_activities": list of kept activities, in order of relevance
- "removed_activities": list of removed activities
- "changes_summary": brief explanation of the selection"#;

// ─── Cross-reference audit ───────────────────────────────────────────────────

pub const CROSS_REFERENCE_SYSTEM: &str = "You are an expert resume editor.";

/// Replace `{sections}`, `{master}`, `{requirements}`.
pub const CROSS_REFERENCE_TEMPLATE: &str = r#"Check this resume for internal consistency and
alignment with the job requirements: skills claimed but never demonstrated, technologies
used in experience but missing from skills, dates that do not add up, and any claim that
the master CV does not support.

Resume sections:
{sections}

Master CV (source of truth):
{master}

Job requirements:
{requirements}

Return a JSON object with:
- "issues_found": list of short issue descriptions (empty if none)
- "corrected_sections": object of proposed section replacements (may be empty)"#;

// ─── Australian English ──────────────────────────────────────────────────────

pub const AU_ENGLISH_SYSTEM: &str = "You are an editor who converts American English spelling \
    to Australian English without changing the meaning.";

/// Replace `{texts}`.
pub const AU_ENGLISH_TEMPLATE: &str = r#"Convert each text below to Australian English spelling
(colour, organise, centre, programme, analyse, licence as a noun). Change spelling only: keep
every word, number, name and technology exactly as written, and keep the punctuation.

Texts (JSON list):
{texts}

Return a JSON object with:
- "converted": list of the converted texts, same length and order as the input"#;

