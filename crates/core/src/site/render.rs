//! HTML templates for the generated pages.

use std::fmt::Write;

use crate::models::GameRecord;

/// Escape text for use in element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Site-wide values shared by every page.
pub(crate) struct Layout<'a> {
    pub site_name: &'a str,
    pub site_url: &'a str,
}

impl Layout<'_> {
    fn head(&self, out: &mut String, title: &str, description: &str, path: &str, image: Option<&str>) {
        let site_url = self.site_url.trim_end_matches('/');
        let _ = writeln!(
            out,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
             <meta charset=\"UTF-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
             <title>{title} | {site}</title>\n\
             <meta name=\"description\" content=\"{description}\">\n\
             <meta property=\"og:title\" content=\"{title} | {site}\">\n\
             <meta property=\"og:description\" content=\"{description}\">\n\
             <meta property=\"og:url\" content=\"{url}\">\n\
             <meta property=\"og:type\" content=\"website\">",
            title = escape(title),
            site = escape(self.site_name),
            description = escape(description),
            url = escape(&format!("{site_url}/{path}")),
        );
        if let Some(image) = image {
            let _ = writeln!(out, "<meta property=\"og:image\" content=\"{}\">", escape(image));
        }
        let _ = writeln!(
            out,
            "<link rel=\"canonical\" href=\"{}\">\n</head>\n<body>",
            escape(&format!("{site_url}/{path}"))
        );
    }

    fn header(&self, out: &mut String, home: &str) {
        let _ = writeln!(
            out,
            "<header><nav><a class=\"logo\" href=\"{home}\">{}</a> <a href=\"{home}games.html\">All Games</a></nav></header>",
            escape(self.site_name)
        );
    }

    fn footer(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "<footer><p>&copy; {}. All rights reserved.</p></footer>\n</body>\n</html>",
            escape(self.site_name)
        );
    }
}

fn card(out: &mut String, href: &str, game: &GameRecord, tags: &[String]) {
    let title = escape(&game.title);
    let _ = writeln!(
        out,
        "<a class=\"game-card\" href=\"{}\" data-category=\"{}\" data-tags=\"{}\">",
        escape(href),
        escape(game.category_name()),
        escape(&tags.join(","))
    );
    match game.thumbnail_url.as_deref() {
        Some(thumbnail) => {
            let _ = writeln!(
                out,
                "<div class=\"game-thumbnail\"><img src=\"{}\" alt=\"{title}\" loading=\"lazy\"></div>",
                escape(thumbnail)
            );
        }
        None => out.push_str("<div class=\"game-thumbnail thumbnail-fallback\"></div>\n"),
    }
    let _ = writeln!(
        out,
        "<div class=\"game-info\"><h3 class=\"game-card-title\">{title}</h3>\
         <p class=\"game-card-description\">{}</p></div>\n</a>",
        escape(&game.description)
    );
}

/// Detail page for one game.
pub(crate) fn game_page(
    layout: &Layout<'_>,
    game: &GameRecord,
    slug: &str,
    embed_url: &str,
    tags: &[String],
    related: &[(&str, &GameRecord)],
) -> String {
    let mut out = String::new();
    let description = if game.description.is_empty() {
        format!("Play {} online for free.", game.title)
    } else {
        game.description.clone()
    };
    layout.head(
        &mut out,
        &game.title,
        &description,
        &format!("games/{slug}.html"),
        game.thumbnail_url.as_deref(),
    );
    layout.header(&mut out, "../");

    let title = escape(&game.title);
    let _ = writeln!(
        out,
        "<main>\n<section class=\"game-header\"><h1>{title}</h1>\
         <span class=\"game-category\">{}</span></section>\n\
         <section class=\"game-container\"><iframe class=\"game-iframe\" src=\"{}\" title=\"{title}\" \
         allowfullscreen loading=\"lazy\"></iframe></section>\n\
         <section class=\"game-content\">\n<div class=\"game-description\"><h2>About This Game</h2><p>{}</p>",
        escape(game.category_name()),
        escape(embed_url),
        escape(&description)
    );

    if let Some(added) = game.added_at {
        let _ = writeln!(out, "<p class=\"release-date\">Added {}</p>", added.format("%B %d, %Y"));
    }
    if !tags.is_empty() {
        out.push_str("<div class=\"game-tags\">");
        for tag in tags {
            let _ = write!(out, "<span class=\"tag\">{}</span>", escape(tag));
        }
        out.push_str("</div>\n");
    }
    out.push_str("</div>\n<div class=\"game-sidebar\">\n");

    if !game.features.is_empty() {
        out.push_str("<div class=\"info-card\"><h3>Game Features</h3><ul class=\"features-list\">");
        for feature in &game.features {
            let _ = write!(out, "<li>{}</li>", escape(feature));
        }
        out.push_str("</ul></div>\n");
    }
    if !game.controls.is_empty() {
        out.push_str("<div class=\"info-card\"><h3>Controls</h3><div class=\"controls-grid\">");
        for (key, action) in &game.controls {
            let _ = write!(
                out,
                "<div class=\"control-item\"><span class=\"control-key\">{}</span><span>{}</span></div>",
                escape(key),
                escape(action)
            );
        }
        out.push_str("</div></div>\n");
    }
    out.push_str("</div>\n</section>\n");

    if !related.is_empty() {
        out.push_str(
            "<section class=\"related-games\"><h2>More Games You Might Like</h2><div class=\"games-grid\">\n",
        );
        for (related_slug, related_game) in related {
            card(&mut out, &format!("{related_slug}.html"), related_game, &[]);
        }
        out.push_str("</div></section>\n");
    }
    out.push_str("</main>\n");
    layout.footer(&mut out);
    out
}

/// Listing of every game.
pub(crate) fn listing_page(layout: &Layout<'_>, games: &[(&str, &GameRecord, &[String])]) -> String {
    let mut out = String::new();
    layout.head(
        &mut out,
        "All Games",
        &format!("Browse {} free browser games.", games.len()),
        "games.html",
        None,
    );
    layout.header(&mut out, "");
    let _ = writeln!(
        out,
        "<main>\n<h1>All Games</h1>\n<p class=\"game-count\">{} games</p>\n<div class=\"games-grid\">",
        games.len()
    );
    for (slug, game, tags) in games {
        card(&mut out, &format!("games/{slug}.html"), game, tags);
    }
    out.push_str("</div>\n</main>\n");
    layout.footer(&mut out);
    out
}
