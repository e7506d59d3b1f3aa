//! Human-readable and JSON rendering of command results.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use btwgames_core::{
    pipeline::RunSummary,
    site::GenerationReport,
    store::{CatalogStats, CategoryCount, GamePlayStats, GameRow, ImportSummary, Page},
};

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }

    if let Some(scrape) = summary.scrape {
        println!(
            "Scraped {} candidates ({} fetch failures, {} parse failures)",
            scrape.candidates, scrape.fetch_failures, scrape.extract_failures
        );
    }
    if summary.listing_failed {
        println!("Listing page could not be fetched; existing data kept");
    }
    let merge = &summary.merge;
    println!(
        "Added {}, skipped {}, rejected {}, truncated {}; collection holds {} games",
        merge.added, merge.skipped, merge.rejected, merge.truncated, merge.total
    );
    if let Some(import) = &summary.import {
        print_import(import);
    }
    if let Some(site) = summary.site {
        println!(
            "Rendered {} pages ({} failed, {} stale removed)",
            site.rendered, site.failed, site.pruned
        );
    }
    println!("Failed: {}", summary.failed());
    Ok(())
}

pub fn import_summary(summary: &ImportSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }
    print_import(summary);
    Ok(())
}

fn print_import(summary: &ImportSummary) {
    println!(
        "Imported {} new games ({} already stored, {} rejected); database holds {}",
        summary.inserted, summary.existing, summary.rejected, summary.total
    );
}

#[derive(Serialize)]
struct FailedPage<'a> {
    slug: &'a str,
    error: String,
}

pub fn generation_report(report: &GenerationReport, output_dir: &Path, json: bool) -> Result<()> {
    let failed: Vec<FailedPage<'_>> = report
        .failed
        .iter()
        .map(|failure| FailedPage {
            slug: &failure.slug,
            error: failure.error.to_string(),
        })
        .collect();

    if json {
        return print_json(&serde_json::json!({
            "output_dir": output_dir,
            "rendered": report.rendered,
            "pruned": report.pruned,
            "failed": failed,
        }));
    }

    println!(
        "Rendered {} pages into {} ({} stale removed)",
        report.rendered,
        output_dir.display(),
        report.pruned
    );
    for page in &failed {
        println!("  skipped {}: {}", page.slug, page.error);
    }
    Ok(())
}

pub fn game_page(page: &Page<GameRow>, json: bool) -> Result<()> {
    if json {
        return print_json(page);
    }

    if page.items.is_empty() {
        println!("No games found");
        return Ok(());
    }
    for game in &page.items {
        println!(
            "{:>5}  {:<40}  {:<14}  {:>6} plays{}",
            game.id,
            truncate(&game.title, 40),
            truncate(&game.category_name, 14),
            game.total_plays,
            if game.is_new { "  NEW" } else { "" }
        );
    }
    println!(
        "Page {} of {} ({} games)",
        page.page,
        page.pages.max(1),
        page.total
    );
    Ok(())
}

pub fn game_detail(game: &GameRow, json: bool) -> Result<()> {
    if json {
        return print_json(game);
    }

    println!("{} (#{}, {})", game.title, game.id, game.slug);
    println!("Category: {}", game.category_name);
    if let Some(kind) = game.game_type {
        println!("Type:     {}", kind.label());
    }
    println!("Plays:    {}", game.total_plays);
    println!("Added:    {}", game.added_at.format("%Y-%m-%d %H:%M UTC"));
    println!("Source:   {}", game.source_url);
    println!("Embed:    {}", game.embed_url);
    if !game.tags.is_empty() {
        println!("Tags:     {}", game.tags.join(", "));
    }
    if !game.description.is_empty() {
        println!("\n{}", game.description);
    }
    if !game.controls.is_empty() {
        println!("\nControls:");
        for (key, action) in &game.controls {
            println!("  {key}: {action}");
        }
    }
    Ok(())
}

pub fn stats(stats: &CatalogStats, categories: &[CategoryCount], json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "stats": stats,
            "categories": categories,
        }));
    }

    println!(
        "{} games, {} plays, {} new",
        stats.total_games, stats.total_plays, stats.new_games
    );
    if !stats.popular.is_empty() {
        println!("\nMost played:");
        for game in &stats.popular {
            println!("  {:>6}  {}", game.total_plays, game.title);
        }
    }
    if !categories.is_empty() {
        println!("\nCategories:");
        for category in categories {
            println!("  {:>4}  {} ({})", category.games, category.name, category.slug);
        }
    }
    Ok(())
}

pub fn play_stats(stats: &GamePlayStats, json: bool) -> Result<()> {
    if json {
        return print_json(stats);
    }

    println!(
        "Game {}: {} plays, {}s played, {:.1}s average",
        stats.game_id, stats.plays, stats.total_duration_secs, stats.average_duration_secs
    );
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}
