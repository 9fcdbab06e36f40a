use std::fmt::Write;

use shared::{Incident, StatusView, ViewModel, SUMMARY_LIMIT};

pub fn render(view: &ViewModel) -> String {
    let mut out = String::new();

    let _ = write!(out, "API   {}", view.api_base);
    if view.api_base_overridden {
        let _ = write!(out, " (override, default {})", view.default_api_base);
    }
    let _ = writeln!(out, "\ndocs  {}", view.docs_url);
    if view.localhost_warning {
        let _ = writeln!(
            out,
            "warning: API base points at localhost; a deployed backend will not be reached"
        );
    }

    let status = match &view.status {
        StatusView::Loading => "loading".to_string(),
        StatusView::Ready => "ready".to_string(),
        StatusView::Error {
            message,
            recoverable: true,
        } => format!("{message} (retrying)"),
        StatusView::Error { message, .. } => format!("error: {message}"),
    };
    let _ = write!(out, "\nstatus {status}");
    if view.waking {
        out.push_str(" [waking backend]");
    }
    if let Some(handle) = view.polling {
        let _ = write!(out, " [{handle}");
        if let Some(interval) = view.poll_interval_ms {
            let _ = write!(out, " every {interval}ms");
        }
        out.push(']');
    }
    out.push('\n');

    let stats = &view.stats;
    let _ = write!(
        out,
        "total {}  open {}  investigating {}  resolved {}",
        stats.total, stats.open, stats.investigating, stats.resolved
    );
    if view.stale {
        out.push_str("  (stale)");
    }
    out.push('\n');

    if !view.incidents.is_empty() {
        out.push('\n');
        for incident in view.recent(SUMMARY_LIMIT) {
            out.push_str(&incident_line(incident));
            out.push('\n');
        }
        let hidden = view.incidents.len().saturating_sub(SUMMARY_LIMIT);
        if hidden > 0 {
            let _ = writeln!(out, "... and {hidden} more");
        }
    }

    if let Some(progress) = &view.injecting {
        let _ = writeln!(
            out,
            "\nsending events {}/{} ({} failed)",
            progress.completed, progress.total, progress.failed
        );
    }
    if let Some(notice) = &view.notice {
        let _ = writeln!(out, "\n{notice}");
    }

    out
}

fn incident_line(incident: &Incident) -> String {
    let severity = incident
        .severity
        .map_or_else(|| "--".to_string(), |s| s.to_string());
    format!(
        "{:<6} {:<3} {:<14} {:<24} {}",
        incident.id.to_string(),
        severity,
        incident.status.as_str(),
        incident.service,
        incident.summary.as_deref().unwrap_or("(no summary)")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{IncidentId, IncidentStatus, Severity, Stats};

    fn incident(id: i64) -> Incident {
        Incident {
            id: IncidentId(id),
            service: "payment-service".into(),
            category: Some("database".into()),
            severity: Some(Severity::P1),
            summary: Some("Connection pool exhausted".into()),
            status: IncidentStatus::Open,
            created_at: "2024-05-01T10:00:00".into(),
            event_count: 12,
        }
    }

    #[test]
    fn test_render_ready() {
        let view = ViewModel {
            status: StatusView::Ready,
            incidents: vec![incident(1)],
            stats: Stats {
                total: 1,
                open: 1,
                investigating: 0,
                resolved: 0,
            },
            api_base: "https://ops.example.com".into(),
            docs_url: "https://ops.example.com/docs".into(),
            ..ViewModel::default()
        };
        let text = render(&view);
        assert!(text.contains("status ready"));
        assert!(text.contains("total 1  open 1"));
        assert!(text.contains("#1"));
        assert!(text.contains("Connection pool exhausted"));
        assert!(!text.contains("warning"));
    }

    #[test]
    fn test_render_error_with_stale_data() {
        let view = ViewModel {
            status: StatusView::Error {
                message: "backend waking up".into(),
                recoverable: true,
            },
            incidents: (1..=12).map(incident).collect(),
            stale: true,
            localhost_warning: true,
            notice: Some("event sent".into()),
            ..ViewModel::default()
        };
        let text = render(&view);
        assert!(text.contains("backend waking up (retrying)"));
        assert!(text.contains("(stale)"));
        assert!(text.contains("... and 2 more"));
        assert!(text.contains("warning: API base points at localhost"));
        assert!(text.trim_end().ends_with("event sent"));
    }
}
