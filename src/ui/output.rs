use crate::aggregate::{ErrorDetail, ErrorDetails, OutputRecord};
use crate::record::RecordKey;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::LINK, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

/// Human rendering of one output record
pub fn output_record(record: &OutputRecord) {
    println!("{}", render_record(record));
}

pub fn render_record(record: &OutputRecord) -> String {
    let status = record.status();
    let code = status.code().to_string();
    let code = code.style(theme().status(status)).to_string();

    match record {
        OutputRecord::Edge(edge) => format!(
            "{} {} {}/{}/{} {} {}/{}/{}",
            Icons::CHECK,
            code,
            edge.source_system,
            edge.source_type,
            edge.source_id,
            Icons::RIGHT,
            edge.target_system,
            edge.target_type,
            edge.target_id,
        ),
        OutputRecord::Aggregate(aggregate) => {
            let mut lines = vec![format!(
                "{} {} {}/{}/{}",
                Icons::CHECK,
                code,
                aggregate.system,
                aggregate.record_type,
                aggregate.record_id
            )];
            lines.extend(aggregate.sources.iter().map(|k| linked_line(Icons::LEFT, k)));
            lines.extend(aggregate.targets.iter().map(|k| linked_line(Icons::RIGHT, k)));
            lines.join("\n")
        }
        OutputRecord::Error(err) => {
            let details: Vec<&ErrorDetail> = match &err.error_detail {
                ErrorDetails::One(detail) => vec![detail],
                ErrorDetails::Many(details) => details.iter().collect(),
            };
            let mut lines = vec![format!("{} {}", Icons::CROSS, code)];
            lines.extend(details.into_iter().map(detail_line));
            lines.join("\n")
        }
    }
}

fn linked_line(icon: &str, key: &RecordKey) -> String {
    format!("   {} {}", icon, key)
}

fn detail_line(detail: &ErrorDetail) -> String {
    let subject = match (&detail.system, &detail.record_type, &detail.id) {
        (Some(system), Some(record_type), Some(id)) => format!("{}/{}/{}", system, record_type, id),
        _ => "batch".to_string(),
    };
    let mut line = format!("   {}: {}", subject, detail.message);
    if let Some(cause) = &detail.cause {
        line.push_str(&format!(" ({})", cause.style(theme().dim.clone())));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregateRecord, ErrorRecord, Status};

    #[test]
    fn test_render_aggregate_lists_links() {
        let record = OutputRecord::Aggregate(AggregateRecord {
            status: Status::Ok,
            system: "shopify".into(),
            record_type: "order".into(),
            record_id: "1".into(),
            sources: vec![RecordKey::new("crm", "deal", "d").unwrap()],
            targets: vec![RecordKey::new("catalog", "product", "p").unwrap()],
        });

        let text = render_record(&record);
        assert!(text.contains("shopify/order/1"));
        assert!(text.contains("crm/deal/d"));
        assert!(text.contains("catalog/product/p"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_render_error_lists_details() {
        let record = OutputRecord::Error(ErrorRecord {
            status: Status::Internal,
            error_detail: ErrorDetails::Many(vec![
                ErrorDetail::new("failed to create links").with_cause(&"database is locked"),
            ]),
        });

        let text = render_record(&record);
        assert!(text.contains("500"));
        assert!(text.contains("batch: failed to create links"));
        assert!(text.contains("database is locked"));
    }
}
