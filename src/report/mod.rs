//! Builds the evidence dossier and headline prompt for a significant
//! cluster, and parses the model's accept/reject verdict back out.

use crate::model::{InvestigationCluster, ReportEntry};
use crate::storage::RepositoryCache;

/// Domain-specific jargon term injected into the prompt when a topic
/// filter is active, so the model recognizes deployment slang it
/// wouldn't otherwise know to watch for.
const JARGON_HINT: &str = "Eselmetalle";

/// Oldest-truncation window kept from a cluster's cached context.
const CONTEXT_CAP_CHARS: usize = 4000;

/// Comments quoted per thread in the dossier.
const DOSSIER_COMMENT_LIMIT: usize = 15;

/// `CASE ID:`/`THREAD SOURCE` dossier for `cluster`, looked up live
/// against `repository` for the best active thread's title and top
/// comments. Degrades to an "(unavailable)" thread source rather than
/// failing outright if the thread has since dropped out of the cache.
pub fn build_report_data(cluster: &InvestigationCluster, repository: &RepositoryCache) -> String {
    let mut out = String::new();
    out.push_str(&format!("CASE ID: {}\n", cluster.id));
    out.push_str(&format!("Initial Title: {}\n", cluster.initial_title));
    out.push_str(&format!("Active Threads: {}\n\n", cluster.active_thread_ids.len()));

    out.push_str("THREAD SOURCE\n");
    match repository.get_thread(&cluster.best_thread_id) {
        Ok(Some(thread)) => {
            out.push_str(&format!("Title: {}\n", thread.title));
            if let Some(text) = &thread.text {
                if !text.is_empty() {
                    out.push_str(&format!("Body: {text}\n"));
                }
            }

            match repository.get_comments_for_thread(&thread.id, DOSSIER_COMMENT_LIMIT) {
                Ok(comments) => {
                    for comment in comments.iter().take(DOSSIER_COMMENT_LIMIT) {
                        out.push_str(&format!(
                            "{} (Score: {}): {}\n",
                            comment.author, comment.score, comment.body
                        ));
                    }
                }
                Err(e) => {
                    tracing::warn!("build_report_data: failed to fetch comments: {e:#}");
                }
            }
        }
        Ok(None) => out.push_str("(unavailable)\n"),
        Err(e) => {
            tracing::warn!("build_report_data: failed to fetch best thread: {e:#}");
            out.push_str("(unavailable)\n");
        }
    }

    out
}

/// Combines `new_report_data` with the cluster's existing cached
/// context, if any, keeping at most the last [`CONTEXT_CAP_CHARS`] of
/// old context and delimiting new data with an `=== UPDATE ===`
/// separator.
pub fn build_combined_context(cached_context: Option<&str>, new_report_data: &str) -> String {
    match cached_context {
        Some(existing) if !existing.is_empty() => {
            let truncated = crate::util::keep_last_chars(existing, CONTEXT_CAP_CHARS);
            let stamp = chrono::Utc::now().format("%H:%M:%S");
            format!("{truncated}\n=== UPDATE {stamp} ===\n{new_report_data}")
        }
        _ => new_report_data.to_string(),
    }
}

/// Composes the full headline-writing prompt: rolling history, the
/// combined dossier context, and a topic-restriction clause.
pub fn build_headline_prompt(
    history: &[ReportEntry],
    context: &str,
    show_all: bool,
    topics: &[String],
) -> String {
    let mut prompt = String::new();

    if !history.is_empty() {
        prompt.push_str("PREVIOUS HEADLINES:\n");
        for entry in history {
            prompt.push_str(&entry.display());
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("CASE CONTEXT:\n");
    prompt.push_str(context);
    prompt.push_str("\n\n");

    if show_all || topics.is_empty() {
        prompt.push_str("No topic restriction.\n");
    } else {
        prompt.push_str(&format!("Restrict coverage to these topics: {}\n", topics.join(", ")));
        prompt.push_str(&format!("Watch for deployment-specific slang such as \"{JARGON_HINT}\".\n"));
    }

    prompt.push_str(
        "\nRespond with your reasoning, then exactly one line `VERDICT: ACCEPT` or \
         `VERDICT: REJECT`, then exactly one line `REPORT: <headline>` (or `REPORT: -1` \
         if there is nothing worth reporting).\n",
    );

    prompt
}

/// True iff `response` contains the literal line `VERDICT: ACCEPT`.
pub fn is_accepted(response: &str) -> bool {
    response.lines().any(|line| line.trim() == "VERDICT: ACCEPT")
}

/// Scans for a `REPORT: {rest}` line. Returns an empty string if `rest`
/// is `-1`, empty, or the line is absent entirely.
pub fn extract_headline(response: &str) -> String {
    for line in response.lines() {
        if let Some(rest) = line.trim().strip_prefix("REPORT:") {
            let rest = rest.trim();
            if rest.is_empty() || rest == "-1" {
                return String::new();
            }
            return rest.to_string();
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn is_accepted_requires_exact_verdict_line() {
        assert!(is_accepted("reasoning...\nVERDICT: ACCEPT\nREPORT: hi"));
        assert!(!is_accepted("VERDICT: REJECT\nREPORT: hi"));
        assert!(!is_accepted("we should VERDICT: ACCEPT this"));
    }

    #[test]
    fn extract_headline_trims_and_returns_rest() {
        assert_eq!(extract_headline("REPORT:   breaking news  "), "breaking news");
    }

    #[test]
    fn extract_headline_rejects_negative_one() {
        assert_eq!(extract_headline("REPORT: -1"), "");
    }

    #[test]
    fn extract_headline_rejects_empty_rest() {
        assert_eq!(extract_headline("REPORT: "), "");
    }

    #[test]
    fn extract_headline_absent_line_returns_empty() {
        assert_eq!(extract_headline("no report line here"), "");
    }

    #[test]
    fn combined_context_with_no_cache_returns_new_data_only() {
        assert_eq!(build_combined_context(None, "fresh"), "fresh");
    }

    #[test]
    fn combined_context_truncates_old_portion_and_adds_separator() {
        let old = "x".repeat(5000);
        let combined = build_combined_context(Some(&old), "new stuff");
        assert!(combined.contains("=== UPDATE "));
        assert!(combined.ends_with("new stuff"));
        assert!(combined.len() < old.len() + "new stuff".len() + 20);
    }

    #[test]
    fn headline_prompt_injects_no_restriction_when_show_all() {
        let prompt = build_headline_prompt(&[], "ctx", true, &[]);
        assert!(prompt.contains("No topic restriction."));
    }

    #[test]
    fn headline_prompt_injects_jargon_hint_with_topic_filter() {
        let prompt = build_headline_prompt(&[], "ctx", false, &["finance".to_string()]);
        assert!(prompt.contains("finance"));
        assert!(prompt.contains(JARGON_HINT));
    }

    #[test]
    fn headline_prompt_includes_rolling_history() {
        let history = vec![ReportEntry {
            headline: "first headline".to_string(),
            timestamp: Utc::now(),
        }];
        let prompt = build_headline_prompt(&history, "ctx", true, &[]);
        assert!(prompt.contains("first headline"));
    }
}
