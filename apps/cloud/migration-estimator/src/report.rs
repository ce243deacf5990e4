//! Report rendering for the CLI: JSON or a plain-text table

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use domain_pricing::{
    CacheStatus, Confidence, CostSummary, EstimationReport, PricingCatalog, PricingSource,
    ResourceCategory,
};
use rust_decimal::Decimal;
use strum::IntoEnumIterator;

const RULE_WIDTH: usize = 80;
const SECTION_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn render_report(report: &EstimationReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report),
        OutputFormat::Table => Ok(render_table(report)),
    }
}

fn category_label(category: ResourceCategory) -> &'static str {
    match category {
        ResourceCategory::Compute => "Virtual Machines",
        ResourceCategory::BlockStorage => "Storage Accounts",
        ResourceCategory::RelationalDb => "SQL Databases",
        ResourceCategory::AppRuntime => "App Services",
        ResourceCategory::Other => "Other Resources",
    }
}

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(SECTION_WIDTH));
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn render_table(report: &EstimationReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "AZURE TO AWS MIGRATION COST ESTIMATE");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Generated: {}", timestamp(report.generated_at));
    let _ = writeln!(out, "Job:       {}", report.job_id);

    section(&mut out, "DISCOVERED RESOURCES");
    for category in ResourceCategory::iter() {
        let count = report
            .line_items
            .iter()
            .filter(|item| item.category == category)
            .count();
        if count > 0 {
            let _ = writeln!(out, "  {}: {}", category_label(category), count);
        }
    }
    let _ = writeln!(out, "  Total: {}", report.line_items.len());

    section(&mut out, "AWS COST ESTIMATES");
    for category in ResourceCategory::iter() {
        let items: Vec<_> = report
            .line_items
            .iter()
            .filter(|item| item.category == category)
            .collect();
        if items.is_empty() {
            continue;
        }

        let _ = writeln!(out, "{}:", category_label(category));
        for item in items {
            let flag = match item.confidence {
                Confidence::Low => " [low confidence]",
                Confidence::High => "",
            };
            let size = item
                .estimated_gb
                .map(|gb| format!(" ({gb} GB)"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  • {} → {}{}: {}/month{}",
                item.resource_name,
                item.target_sku,
                size,
                money(item.monthly_cost),
                flag
            );
        }
    }

    section(&mut out, "SUMMARY");
    write_summary(&mut out, &report.summary);
    if let Some(converted) = &report.converted_summary {
        let _ = writeln!(
            out,
            "  In {}: {:.2}/month (target), {} source",
            converted.currency,
            converted.grand_total,
            converted
                .discounted_source_total
                .map(|total| format!("{total:.2}"))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    section(&mut out, "PRICING SOURCES");
    for source in &report.pricing_sources {
        let _ = writeln!(
            out,
            "  {}: {} ({} entries, as of {})",
            source.source,
            source.provenance,
            source.entries,
            timestamp(source.fetched_at)
        );
    }

    section(&mut out, "NOTES");
    if report.low_confidence_count > 0 {
        let _ = writeln!(
            out,
            "  • {} resource(s) had no direct mapping and were priced at a category default",
            report.low_confidence_count
        );
    }
    let _ = writeln!(out, "  • These are rough estimates based on on-demand list prices");
    let _ = writeln!(
        out,
        "  • Actual costs vary with utilization, data transfer, reserved capacity and region"
    );
    let _ = writeln!(
        out,
        "  • Validate against the AWS Pricing Calculator before committing to a migration"
    );
    let _ = writeln!(out, "{rule}");

    out
}

fn write_summary(out: &mut String, summary: &CostSummary) {
    for category in ResourceCategory::iter() {
        let subtotal = summary.subtotal(category);
        if !subtotal.is_zero() {
            let _ = writeln!(out, "  {:<24}{:>14}", category_label(category), money(subtotal));
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  ESTIMATED TOTAL MONTHLY AWS COST: {}",
        money(summary.grand_total)
    );

    let Some(source_total) = summary.source_total else {
        let _ = writeln!(out, "  Current Azure cost: unknown");
        return;
    };
    let _ = writeln!(out, "  Current Azure cost (list):        {}", money(source_total));
    if !summary.discount_percent.is_zero() {
        if let Some(discounted) = summary.discounted_source_total {
            let _ = writeln!(
                out,
                "  Azure cost with {}% discount:    {}",
                summary.discount_percent.normalize(),
                money(discounted)
            );
        }
    }
    if let Some(savings) = summary.savings_amount {
        let percent = summary
            .savings_percent
            .map(|pct| format!(" ({pct:.2}%)"))
            .unwrap_or_default();
        let _ = writeln!(out, "  Estimated monthly savings:        {}{}", money(savings), percent);
    }
}

/// Every catalog entry with its provenance, one per line
pub fn render_prices(catalog: &PricingCatalog) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8}{:<16}{:<28}{:>12}  {:<10}{}",
        "PROVIDER", "CATEGORY", "SKU", "PRICE", "UNIT", "PROVENANCE"
    );
    for (key, entry) in catalog.entries() {
        let _ = writeln!(
            out,
            "{:<8}{:<16}{:<28}{:>12}  {:<10}{}",
            key.provider.to_string(),
            key.category.to_string(),
            key.sku,
            format!("{:.4}", entry.price.amount),
            entry.price.unit.to_string(),
            entry.provenance
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<8}{:>12}  {}", "CURRENCY", "PER USD", "PROVENANCE");
    for (currency, rate) in catalog.exchange_rates() {
        let _ = writeln!(
            out,
            "{:<8}{:>12}  {}",
            currency,
            format!("{:.4}", rate.rate),
            rate.provenance
        );
    }
    out
}

pub fn render_cache_status(rows: &[(PricingSource, CacheStatus)]) -> String {
    let mut out = String::new();
    for (source, status) in rows {
        let detail = match status {
            CacheStatus::Valid { fetched_at } => format!("valid (fetched {})", timestamp(*fetched_at)),
            CacheStatus::Stale { fetched_at } => format!("stale (fetched {})", timestamp(*fetched_at)),
            CacheStatus::Missing => "missing".to_string(),
        };
        let _ = writeln!(out, "{:<16}{}", source.service_name(), detail);
    }
    out
}
