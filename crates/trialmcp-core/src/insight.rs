use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error};

use crate::error::{TrialError, TrialResult};

/// Wording used when rendering the memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoTemplate {
    pub title: &'static str,
    pub heading: &'static str,
    /// Data source named in the summary line.
    pub source: &'static str,
    /// Returned by `render` while nothing has been recorded.
    pub empty: &'static str,
}

impl MemoTemplate {
    pub const TRIALS: MemoTemplate = MemoTemplate {
        title: "📊 Clinical Trials Landscape Analysis",
        heading: "Key Insights from AACT:",
        source: "the AACT database",
        empty: "No landscape analysis available yet.",
    };

    pub const DRUGS: MemoTemplate = MemoTemplate {
        title: "🔍 Drug Data Analysis",
        heading: "Key Insights from OpenFDA:",
        source: "OpenFDA data",
        empty: "No drug analysis available yet.",
    };
}

/// Append-only list of findings recorded during a session.
#[derive(Debug)]
pub struct InsightStore {
    template: MemoTemplate,
    insights: Mutex<Vec<String>>,
}

impl InsightStore {
    pub fn new(template: MemoTemplate) -> Self {
        Self {
            template,
            insights: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, insight: &str) -> TrialResult<()> {
        if insight.trim().is_empty() {
            error!("attempted to add empty insight");
            return Err(TrialError::EmptyInsight);
        }

        let mut insights = self.lock();
        insights.push(insight.to_string());
        debug!("added insight, total: {}", insights.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Render every finding, in insertion order, as a plain-text memo.
    pub fn render(&self) -> String {
        let insights = self.lock();
        debug!("rendering memo with {} insights", insights.len());

        if insights.is_empty() {
            return self.template.empty.to_string();
        }

        let mut memo = format!("{}\n\n{}\n\n", self.template.title, self.template.heading);
        let bullets: Vec<String> = insights.iter().map(|i| format!("- {i}")).collect();
        memo.push_str(&bullets.join("\n"));

        if insights.len() > 1 {
            memo.push_str(&format!(
                "\n\nSummary:\nAnalysis has identified {} key insights from {}.",
                insights.len(),
                self.template.source
            ));
        }

        memo
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.insights.lock().unwrap_or_else(|e| e.into_inner())
    }
}
