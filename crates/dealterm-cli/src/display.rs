//! Human-readable rendering of pipeline results.

use colored::Colorize;

use dealterm_core::model::{CriticalPage, PageClassification, TermSet};
use dealterm_pipeline::ExtractionOutcome;

pub fn print_classifications(classifications: &[Option<PageClassification>]) {
    println!("{}", "PAGE CLASSIFICATION".bold());
    for (idx, slot) in classifications.iter().enumerate() {
        let page = idx + 1;
        match slot {
            Some(cls) => {
                let filled = if cls.has_filled_fields { "filled" } else { "blank" };
                println!(
                    "  {page:>3}  {:<12} {:<20} {:<18} {filled:<6} {:>3.0}%",
                    cls.form_code,
                    cls.role.as_str(),
                    cls.content_category.as_str(),
                    cls.confidence,
                );
            }
            None => println!("  {page:>3}  {}", "no form detected".dimmed()),
        }
    }
}

pub fn print_critical_pages(critical: &[CriticalPage], total: usize) {
    println!(
        "{} {} of {total} pages",
        "CRITICAL PAGES".bold(),
        critical.len()
    );
    for page in critical {
        println!("  {:>3}  {}", page.page_number, page.label);
    }
}

pub fn print_outcome(outcome: &ExtractionOutcome, show_audit: bool) {
    println!("{} run {}", "EXTRACTION".bold(), outcome.run_id);
    print_terms(&outcome.final_terms);

    println!();
    if outcome.needs_review {
        println!("{}", "NEEDS REVIEW".yellow().bold());
        for error in &outcome.details.validation.errors {
            println!("  {} {error}", "error:".red());
        }
        for warning in &outcome.details.validation.warnings {
            println!("  {} {warning}", "warning:".yellow());
        }
    } else {
        println!("{}", "CLEAN".green().bold());
    }
    if outcome.details.second_turn_used {
        println!("  {}", "second-turn re-extraction was used".dimmed());
    }

    println!();
    println!("{}", "PROVENANCE".bold());
    for (field, page) in &outcome.details.provenance {
        println!("  {field:<28} page {page}");
    }

    if show_audit {
        println!();
        println!("{}", "AUDIT TRAIL".bold());
        for entry in outcome.details.audit.entries() {
            println!("  [{:<11}] {}", entry.stage.as_str(), entry.message);
        }
    }
}

fn print_terms(terms: &TermSet) {
    let fmt_names = |names: &Option<Vec<String>>| {
        names
            .as_ref()
            .map(|n| n.join(", "))
            .unwrap_or_else(|| "—".to_string())
    };

    println!("  buyers:     {}", fmt_names(&terms.buyer_names));
    println!("  sellers:    {}", fmt_names(&terms.seller_names));
    println!(
        "  property:   {}",
        terms.property_address.as_deref().unwrap_or("—")
    );
    match terms.purchase_price {
        Some(price) => println!("  price:      {}", format!("${price:.0}").green()),
        None => println!("  price:      {}", "—".red()),
    }
    println!(
        "  effective:  {}",
        terms.effective_date.as_deref().unwrap_or("—")
    );
    println!(
        "  closing:    {}",
        terms
            .closing
            .as_ref()
            .and_then(|c| c.close_of_escrow_date.as_deref())
            .unwrap_or("—")
    );
}
