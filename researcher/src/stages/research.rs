//! Research: one web search, a bounded number of page fetches, then a
//! model-written synthesis of what was found.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use super::{FAILED_FETCH, FALLBACK_NOTES, Stage, StageContext};
use crate::core::types::{RunState, Source};
use crate::io::html::truncate_chars;
use crate::io::prompt::NotesInputs;
use crate::io::search::{SearchHit, SearchQuery};

#[instrument(skip_all, fields(iteration = state.iteration))]
pub fn run(ctx: &StageContext<'_>, state: &mut RunState) -> Result<()> {
    if !state.research_enabled {
        debug!("research disabled; skipping");
        return Ok(());
    }
    if ctx.is_stopped(state) {
        debug!("budget stopped; skipping research");
        return Ok(());
    }
    if ctx.config.freeze_sources && !state.sources.is_empty() {
        debug!(sources = state.sources.len(), "sources frozen; skipping research");
        return Ok(());
    }

    ctx.guard.charge_search(&mut state.budget);
    if ctx.is_stopped(state) {
        return Ok(());
    }

    let query = SearchQuery::new(&state.question, &ctx.config.search);
    let hits = search(ctx, &query);
    state.sources = number_sources(hits);
    info!(sources = state.sources.len(), "search complete");

    let pages = fetch_pages(ctx, state);

    let prompt = ctx.prompts.render_notes(&NotesInputs {
        question: &state.question,
        plan: &state.plan,
        sources: &state.sources,
        pages: &pages,
    })?;
    ctx.guard
        .charge_tokens(&mut state.budget, &prompt, "research prompt");
    if ctx.is_stopped(state) {
        debug!("budget stopped; using fallback notes");
        state.notes = FALLBACK_NOTES.to_string();
        return Ok(());
    }

    let notes = ctx.generate(Stage::Research, &prompt)?;
    ctx.guard
        .charge_tokens(&mut state.budget, &notes, "research output");
    state.notes = notes;
    Ok(())
}

/// Search under the retry policy. Exhausted retries leave the pass without sources.
fn search(ctx: &StageContext<'_>, query: &SearchQuery) -> Vec<SearchHit> {
    match ctx
        .retry
        .run("search", || ctx.services.search.search(query))
    {
        Ok(hits) => hits,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "search failed; continuing without sources");
            Vec::new()
        }
    }
}

fn number_sources(hits: Vec<SearchHit>) -> Vec<Source> {
    hits.into_iter()
        .enumerate()
        .map(|(idx, hit)| Source {
            id: format!("S{}", idx + 1),
            url: hit.url,
            title: hit.title,
            snippet: hit.snippet,
        })
        .collect()
}

/// Fetch up to `pages_per_pass` sources in order, returning one block per attempt.
fn fetch_pages(ctx: &StageContext<'_>, state: &mut RunState) -> Vec<String> {
    let http = &ctx.config.http;
    let limit = ctx.config.search.pages_per_pass as usize;
    let mut pages = Vec::new();
    let mut attempted = 0usize;

    let sources = state.sources.clone();
    for source in &sources {
        if attempted >= limit || ctx.is_stopped(state) {
            break;
        }
        if source.url.trim().is_empty() {
            debug!(id = %source.id, "skipping source without url");
            continue;
        }

        ctx.guard.charge_fetch(&mut state.budget);
        if ctx.is_stopped(state) {
            break;
        }
        attempted += 1;

        let fetched = ctx.retry.run("fetch", || {
            ctx.services
                .fetcher
                .fetch(&source.url, http.timeout(), http.max_chars_per_page)
        });
        let text = match fetched {
            Ok(text) => {
                let text = truncate_chars(&text, http.max_chars_per_page).to_string();
                ctx.guard
                    .charge_tokens(&mut state.budget, &text, "page text");
                text
            }
            Err(err) => {
                warn!(url = %source.url, error = %format!("{err:#}"), "fetch failed");
                FAILED_FETCH.to_string()
            }
        };
        pages.push(format!(
            "{} {}\n{}\n{}",
            source.marker(),
            source.title,
            source.url,
            text
        ));
    }
    pages
}
