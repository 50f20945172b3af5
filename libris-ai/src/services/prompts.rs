//! Prompt builders for each enrichment kind and paid action

use super::llm_client::TextPrompt;
use crate::models::{Item, MediaType};

const JSON_ONLY: &str = "Respond with JSON only. Do not wrap it in markdown.";

fn describe(item: &Item) -> String {
    let by = match item.media_type {
        MediaType::Book => "by",
        MediaType::Movie => "directed by",
    };
    if item.creator.is_empty() {
        format!("the {} \"{}\"", item.media_type, item.title)
    } else {
        format!("the {} \"{}\" {} {}", item.media_type, item.title, by, item.creator)
    }
}

pub fn details_prompt(item: &Item) -> TextPrompt {
    TextPrompt::new(format!(
        "Write a spoiler-free description (3-4 sentences) of {} and up to 6 short genre or \
         theme tags. Return {{\"description\": string, \"tags\": [string]}}. {}",
        describe(item),
        JSON_ONLY
    ))
    .with_temperature(0.4)
}

pub fn characters_prompt(item: &Item) -> TextPrompt {
    TextPrompt::new(format!(
        "List the main characters of {}. For each give name, role, up to 4 traits and their \
         relationships to other listed characters. Return {{\"characters\": [{{\"name\": string, \
         \"role\": string, \"traits\": [string], \"relationships\": [{{\"target\": string, \
         \"type\": string, \"detail\": string}}]}}]}}. {}",
        describe(item),
        JSON_ONLY
    ))
    .with_temperature(0.2)
}

pub fn relation_graph_prompt(item: &Item) -> TextPrompt {
    TextPrompt::new(format!(
        "Build a relationship graph of the main characters in {}. Nodes are characters with a \
         group (faction or family) and a one-sentence bio; links connect two node ids with a \
         relationship type and a short label. Return {{\"nodes\": [{{\"id\": string, \"group\": \
         string, \"bio\": string}}], \"links\": [{{\"source\": string, \"target\": string, \
         \"type\": string, \"label\": string}}]}}. {}",
        describe(item),
        JSON_ONLY
    ))
    .with_temperature(0.2)
}

pub fn quote_prompt(item: &Item) -> TextPrompt {
    TextPrompt::new(format!(
        "Give one memorable, short quotation from {}. Reply with the quotation text only, no \
         attribution and no commentary.",
        describe(item)
    ))
    .with_max_tokens(120)
    .with_temperature(0.9)
}

pub fn cover_prompt(item: &Item) -> String {
    format!(
        "Minimalist illustrated cover art for {}. No text, no lettering, no logos.",
        describe(item)
    )
}

pub fn mood_prompt(item: &Item) -> TextPrompt {
    TextPrompt::new(format!(
        "Pick 3 to 5 single-word moods that capture the atmosphere of {}. Return {{\"moods\": \
         [string]}}. {}",
        describe(item),
        JSON_ONLY
    ))
    .with_temperature(0.5)
}

pub fn recommend_prompt(request: &str, media: MediaType) -> TextPrompt {
    let plural = match media {
        MediaType::Book => "books",
        MediaType::Movie => "movies",
    };
    TextPrompt::new(format!(
        "User request: \"{}\"\n\nIf this is not a request for {} recommendations, return \
         {{\"off_topic\": true, \"message\": string}} explaining what you can help with. \
         Otherwise return {{\"off_topic\": false, \"recommendations\": [{{\"title\": string, \
         \"creator\": string, \"reason\": string}}]}} with up to 5 {}. {}",
        request.trim(),
        plural,
        plural,
        JSON_ONLY
    ))
    .with_system(format!("You recommend {} to readers and viewers.", plural))
    .with_temperature(0.7)
}

pub fn soundtrack_prompt(request: &str) -> TextPrompt {
    TextPrompt::new(format!(
        "User request: \"{}\"\n\nIf this is not a request for music to accompany reading, \
         watching or a described mood, return {{\"off_topic\": true, \"message\": string}}. \
         Otherwise return {{\"off_topic\": false, \"message\": string, \"search_terms\": \
         [string]}} with up to 3 music search terms. {}",
        request.trim(),
        JSON_ONLY
    ))
    .with_temperature(0.7)
}
