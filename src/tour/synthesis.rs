//! Automatic tour generation from page structure.
//!
//! The generated tour is: an optional navigation overview, one step per
//! qualifying section in reading order, and an optional contact-form step.

use std::collections::HashSet;

use crate::config::AnalyzerSettings;
use crate::page::{Document, PageAnalyzer, Section};

use super::model::{StepAction, TourConfig, TourStep};

/// Narration seeds keyed by a word that appears in a section's id or title.
const TOPIC_DESCRIPTIONS: &[(&str, &str)] = &[
    ("hero", "This is the introduction at the top of the page."),
    ("about", "Here you can learn about who is behind this site."),
    ("projects", "These are some featured projects."),
    ("skills", "This section lists skills and technologies."),
    ("experience", "Here is an overview of past experience."),
    ("contact", "This is how you can get in touch."),
    ("services", "These are the services on offer."),
    ("testimonials", "Here is what others have said."),
    ("faq", "Answers to frequently asked questions."),
    ("blog", "Recent articles and posts."),
    ("pricing", "Plans and pricing details."),
    ("features", "The main features at a glance."),
    ("team", "Meet the people behind the work."),
];

/// Knobs for [`generate_tour_from_page`].
#[derive(Debug, Clone)]
pub struct TourOptions {
    pub id: String,
    pub name: String,
    /// Start with an overview of the first navigation region.
    pub include_navigation: bool,
    /// Finish at the first contact form.
    pub include_contact: bool,
    /// Cap on the total number of steps; bookends are counted first.
    pub max_steps: Option<usize>,
    pub analyzer: AnalyzerSettings,
}

impl Default for TourOptions {
    fn default() -> Self {
        Self {
            id: "auto-tour".to_string(),
            name: "Page tour".to_string(),
            include_navigation: true,
            include_contact: true,
            max_steps: None,
            analyzer: AnalyzerSettings::default(),
        }
    }
}

/// Description for a section, picked from the topic vocabulary.
pub fn describe_section(id: &str, title: &str) -> String {
    let haystack = format!("{} {}", id.to_lowercase(), title.to_lowercase());
    TOPIC_DESCRIPTIONS
        .iter()
        .find(|(topic, _)| haystack.contains(topic))
        .map(|(_, description)| description.to_string())
        .unwrap_or_else(|| format!("This section covers {title}."))
}

/// Build a tour from what the page currently contains.
pub fn generate_tour_from_page(doc: &Document, options: &TourOptions) -> TourConfig {
    let analyzer = PageAnalyzer::new(options.analyzer.clone());
    let map = analyzer.analyze_page(doc);

    let nav_step = options
        .include_navigation
        .then(|| map.navigation.first())
        .flatten()
        .map(|nav| {
            TourStep::new("navigation", nav.locator.to_string(), nav.label.clone())
                .with_description("Use these links to jump to any part of the page.")
                .with_action(StepAction::Highlight)
        });

    let contact_step = options
        .include_contact
        .then(|| map.forms.iter().find(|f| f.is_contact_form()))
        .flatten()
        .map(|form| {
            TourStep::new("contact-form", form.locator.to_string(), "Contact form")
                .with_description("Fill in this form to send a message.")
                .with_action(StepAction::Highlight)
        });

    let reserved = usize::from(nav_step.is_some()) + usize::from(contact_step.is_some());
    let section_budget = options
        .max_steps
        .map_or(usize::MAX, |max| max.saturating_sub(reserved));

    let mut ids: HashSet<String> = HashSet::new();
    let mut steps = Vec::new();

    if let Some(step) = nav_step {
        ids.insert(step.id.clone());
        steps.push(step);
    }
    for section in analyzer.tour_sections(&map).into_iter().take(section_budget) {
        let step = section_step(section, &mut ids);
        steps.push(step);
    }
    if let Some(mut step) = contact_step {
        step.id = unique_id(&step.id, &mut ids);
        steps.push(step);
    }

    log::info!(
        "synthesis: generated {} step(s) from {} section(s)",
        steps.len(),
        map.sections.len()
    );

    TourConfig {
        id: options.id.clone(),
        name: options.name.clone(),
        description: map
            .title
            .map(|t| format!("A guided tour of {t}"))
            .unwrap_or_default(),
        steps,
    }
}

fn section_step(section: &Section, ids: &mut HashSet<String>) -> TourStep {
    TourStep::new(
        unique_id(&section.id, ids),
        section.locator.to_string(),
        section.title.clone(),
    )
    .with_description(describe_section(&section.id, &section.title))
    .with_action(StepAction::Spotlight)
}

fn unique_id(base: &str, ids: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while ids.contains(&candidate) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    ids.insert(candidate.clone());
    candidate
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
