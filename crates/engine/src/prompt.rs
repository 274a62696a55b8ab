//! Prompt formatting - pure functions rendering skeleton fragments and
//! narrative state into the text blocks generation prompts consume.
//!
//! Formatters never mutate their input and tolerate a skeleton that is
//! still being generated: structurally incomplete milestones are skipped,
//! not errored. A choice id that cannot be resolved against the skeleton is
//! a hard error, though - that is history/skeleton desync and must not be
//! silently dropped.

use std::collections::HashMap;

use storyloom_domain::{
    DecisionOption, DecisionPoint, DomainError, Milestone, NarrativeState, SkeletonTree,
};

/// Substitute `{name}` placeholders from `params`. Unknown placeholders are
/// left in place.
pub fn render_template(template: &str, params: &HashMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in params {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

pub fn format_decision_option(option: &DecisionOption) -> String {
    format!(
        "[{}] {}\nconsequence: {}",
        option.option_id, option.option_name, option.consequence
    )
}

pub fn format_milestone(milestone: &Milestone) -> String {
    format!(
        "Milestone [{}]: {}\n",
        milestone.milestone_id, milestone.description
    )
}

pub fn format_decision_point(point: &DecisionPoint) -> String {
    let options = point
        .options
        .iter()
        .map(|option| format!("    - {}", option.option_name))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "DecisionPoint [{}]: {}\nOptions:\n{}",
        point.decision_point_id, point.description, options
    )
}

/// Render the whole tree: background, endings (when any), then milestones
/// with nested decision points and options. Incomplete milestones are
/// skipped.
pub fn format_story_skeleton(tree: &SkeletonTree) -> String {
    let mut parts = Vec::new();

    parts.push(format!("### Story Background: {}\n", tree.background));

    if !tree.endings.is_empty() {
        parts.push("### Possible Endings:".to_string());
        for ending in &tree.endings {
            parts.push(format!(
                "- Ending [{}]: {}",
                ending.ending_id, ending.description
            ));
        }
        parts.push(String::new());
    }

    for milestone in tree.milestones.iter().filter(|m| m.is_complete()) {
        parts.push(format!(
            "- Milestone [{}]: {}",
            milestone.milestone_id, milestone.description
        ));
        for point in &milestone.decision_points {
            parts.push(format!(
                "  - DecisionPoint [{}]: {}",
                point.decision_point_id, point.description
            ));
            for option in &point.options {
                parts.push(format!("    - {}", option.option_name));
            }
        }
    }

    parts.join("\n")
}

/// Interleave each prior segment with the option name chosen right after
/// it. Errors when a chosen option id no longer resolves against the
/// skeleton.
pub fn format_progress_with_decisions(
    tree: &SkeletonTree,
    state: &NarrativeState,
) -> Result<String, DomainError> {
    if state.story_progress.is_empty() {
        return Ok(String::new());
    }

    let index = tree.index();
    let mut formatted = String::new();
    for (i, segment) in state.story_progress.iter().enumerate() {
        formatted.push_str(segment);
        formatted.push('\n');
        if let Some(choice_id) = state.chosen_decisions.get(i) {
            let option = index.option(choice_id)?;
            formatted.push_str(&format!("\n[Choice made: {}]\n", option.option_name));
        }
    }
    Ok(formatted)
}

/// Render only the most recent decision, or a sentinel for an unstarted
/// story - the full choice history is already in the progress block.
pub fn format_decisions_made(
    tree: &SkeletonTree,
    state: &NarrativeState,
) -> Result<String, DomainError> {
    match state.chosen_decisions.last() {
        None => Ok("(NONE YET)".to_string()),
        Some(choice_id) => {
            let option = tree.index().option(choice_id)?;
            Ok(format_decision_option(option))
        }
    }
}
