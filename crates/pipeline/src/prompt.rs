//! Prompt text for the LLM stages

use crate::services::ScoringQuery;
use enrich_core::{Chunk, MAX_SUMMARY_WORDS};

pub fn metadata_system_prompt() -> String {
    format!(
        "Return ONE JSON object with exactly these keys:\n\
         {{\"chunk_summary\": string, \
         \"entities\": {{\"person\": [string], \"org\": [string], \"location\": [string]}}, \
         \"topic_tags\": [string], \
         \"event_dates\": [{{\"label\": string, \"year\": int, \"month\": int|null, \"day\": int|null}}], \
         \"role_annotations\": [{{\"person\": string, \"role\": string, \"from_year\": int|null, \"to_year\": int|null}}], \
         \"numeric_facts\": [{{\"name\": string, \"value\": number, \"unit\": string, \"year\": int|null}}], \
         \"department\": [string], \"document_type\": string, \
         \"content_year\": int|null, \"content_month\": int|null, \
         \"initiative\": [string], \"grant_type\": [string]}}\n\
         Rules:\n\
         - Do not add or delete keys; use \"\", [] or null if unknown.\n\
         - chunk_summary has at most {MAX_SUMMARY_WORDS} words and no quotes.\n\
         - role must be a normalised title (president, rector, ...).\n\
         - Dates are numbers only; month and day are null if unknown.\n\
         - content_month is an integer 1-12.\n\
         Output pure JSON, no markdown. Do not invent facts."
    )
}

pub fn metadata_user_prompt(chunk: &Chunk) -> String {
    format!("### Chunk ID\n{}\n\n### Chunk text\n{}", chunk.id, chunk.text)
}

pub fn scoring_system_prompt() -> &'static str {
    "Rate how well the chunk answers the question. Return ONE JSON object:\n\
     {\"relevance_score\": <one of 0.0, 0.2, 0.5, 0.8, 1.0>, \
     \"relevance_reason\": \"<at most 200 characters>\"}\n\
     Rubric: 1.0 exact answer, 0.8 answer present verbatim, 0.5 partial answer, \
     0.2 tangential, 0.0 unrelated.\n\
     Output pure JSON, no markdown, no other keys."
}

pub fn scoring_user_prompt(chunk: &Chunk, query: &ScoringQuery) -> String {
    let mut lines = vec![
        "### Chunk ID".to_string(),
        chunk.id.clone(),
        String::new(),
        "### Chunk text".to_string(),
        chunk.text.clone(),
        String::new(),
        "### Question".to_string(),
    ];

    let mut question = format!("{}. EN: {}", query.question_id, query.question);
    if let Some(de) = &query.question_de {
        question.push_str(&format!(" / DE: {de}"));
    }
    lines.push(question);

    if let Some(answer) = &query.answer {
        let mut line = format!("Reference answer: EN: {answer}");
        if let Some(de) = &query.answer_de {
            line.push_str(&format!(" / DE: {de}"));
        }
        lines.push(line);
    }
    if let Some(notes) = &query.notes {
        lines.push(format!("Scoring notes: {notes}"));
    }

    lines.join("\n")
}
