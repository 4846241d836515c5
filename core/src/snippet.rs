use crate::config::EngineConfig;
use std::collections::HashSet;

/// How matched positions pick the snippet window.
#[derive(Debug, Clone, Copy)]
pub enum Matches<'a> {
    /// Union of every matched position; the densest window wins.
    Flat(&'a [u32]),
    /// An exact proximity combination; the window spans its first to last position.
    Exact(&'a [u32]),
}

#[derive(Debug, Clone)]
pub struct SnippetOptions {
    pub window: usize,
    pub open: String,
    pub close: String,
}

impl From<&EngineConfig> for SnippetOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            window: config.snippet_window,
            open: config.highlight_open.clone(),
            close: config.highlight_close.clone(),
        }
    }
}

/// First and last position of the window holding the most positions, where a window
/// may span at most `window` tokens. `sorted` must be ascending.
pub fn densest_window(sorted: &[u32], window: usize) -> Option<(u32, u32)> {
    let (mut start, mut end) = (0usize, 0usize);
    let mut best: Option<(u32, u32)> = None;
    let mut best_count = 0usize;
    while end < sorted.len() {
        if (sorted[end] - sorted[start]) as usize > window {
            start += 1;
        } else {
            if end - start + 1 > best_count {
                best_count = end - start + 1;
                best = Some((sorted[start], sorted[end]));
            }
            end += 1;
        }
    }
    best
}

/// Renders `tokens` around the matches, wrapping each matched token in highlight markers.
pub fn render(tokens: &[String], matches: Matches<'_>, options: &SnippetOptions) -> String {
    let positions: Vec<u32> = match matches {
        Matches::Flat(p) | Matches::Exact(p) => {
            let mut valid: Vec<u32> = p.iter().copied().filter(|pos| (*pos as usize) < tokens.len()).collect();
            valid.sort_unstable();
            valid.dedup();
            valid
        }
    };
    let bounds = match matches {
        Matches::Flat(_) => densest_window(&positions, options.window),
        Matches::Exact(_) => positions.first().zip(positions.last()).map(|(a, b)| (*a, *b)),
    };
    let Some((first, last)) = bounds else {
        let lead = tokens.len().min(2 * options.window);
        return tokens[..lead].join(" ");
    };

    let highlighted: HashSet<u32> = positions.into_iter().collect();
    let from = (first as usize).saturating_sub(options.window);
    let to = tokens.len().min(last as usize + options.window);
    let body: Vec<String> = (from..to)
        .map(|i| {
            if highlighted.contains(&(i as u32)) {
                format!("{}{}{}", options.open, tokens[i], options.close)
            } else {
                tokens[i].clone()
            }
        })
        .collect();
    format!("... {} ...", body.join(" "))
}
