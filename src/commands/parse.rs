use anyhow::Result;

use crate::commands::CommandReport;
use crate::esmp::identity::{LocalItem, parse_name};

pub fn run(names: &[String]) -> Result<(CommandReport, Vec<LocalItem>)> {
    let mut report = CommandReport::new("parse");
    let items = names.iter().map(|name| parse_name(name)).collect::<Vec<_>>();

    for item in &items {
        let id = item
            .derived_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let tags = item
            .status_tags
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        report.detail(format!(
            "name={} id={id} title={} tags={tags}",
            item.raw_name, item.title
        ));
        if item.title.is_empty() {
            report.issue(format!("{}: empty title", item.raw_name));
        }
    }

    Ok((report, items))
}
