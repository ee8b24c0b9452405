//! Text chunking strategies.
//!
//! Every strategy turns sanitized document text into an ordered list of non-empty passages.
//! Sizes are measured in characters, not bytes, so multi-byte scripts split on the same
//! boundaries as ASCII text. Shared edge cases:
//!
//! - Empty or whitespace-only input yields no chunks.
//! - Input whose trimmed length fits the strategy's size threshold yields exactly one chunk,
//!   the trimmed input.

mod fixed;
mod recursive;
mod semantic;

use thiserror::Error;

/// Separators tried in order by the recursive strategy; `""` splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Errors raised when a strategy is configured with impossible bounds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// Size or maximum was zero.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Semantic minimum is larger than the maximum.
    #[error("minimum chunk size {min} exceeds maximum {max}")]
    MinExceedsMax {
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Recursive overlap would swallow whole chunks.
    #[error("chunk overlap {overlap} must be smaller than chunk size {size}")]
    OverlapTooLarge {
        /// Configured overlap.
        overlap: usize,
        /// Configured size.
        size: usize,
    },
    /// Recursive strategy needs at least one separator.
    #[error("recursive chunking requires at least one separator")]
    MissingSeparators,
}

/// Chunking strategy selected by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Sliding character window that snaps to nearby sentence ends.
    FixedSize {
        /// Window length in characters.
        size: usize,
        /// Characters shared by consecutive windows. May exceed `size`; progress is still
        /// guaranteed.
        overlap: usize,
    },
    /// Greedy sentence packing.
    Semantic {
        /// Length at which a chunk is closed.
        max: usize,
        /// Length a chunk must reach before it may be closed. Advisory for the last chunk.
        min: usize,
    },
    /// Hierarchical splitting over a separator list.
    Recursive {
        /// Upper bound on chunk length.
        size: usize,
        /// Trailing characters of a chunk repeated at the start of the next.
        overlap: usize,
        /// Separators, most structural first.
        separators: Vec<String>,
    },
}

impl ChunkStrategy {
    /// Recursive strategy over [`DEFAULT_SEPARATORS`].
    pub fn recursive(size: usize, overlap: usize) -> Self {
        Self::Recursive {
            size,
            overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Short lowercase name, as accepted by `CHUNK_STRATEGY`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedSize { .. } => "fixed",
            Self::Semantic { .. } => "semantic",
            Self::Recursive { .. } => "recursive",
        }
    }

    /// Reject impossible bounds.
    pub fn validate(&self) -> Result<(), ChunkingError> {
        match self {
            Self::FixedSize { size, .. } if *size == 0 => Err(ChunkingError::InvalidChunkSize),
            Self::FixedSize { .. } => Ok(()),
            Self::Semantic { max, .. } if *max == 0 => Err(ChunkingError::InvalidChunkSize),
            Self::Semantic { max, min } if min > max => Err(ChunkingError::MinExceedsMax {
                min: *min,
                max: *max,
            }),
            Self::Semantic { .. } => Ok(()),
            Self::Recursive { size, .. } if *size == 0 => Err(ChunkingError::InvalidChunkSize),
            Self::Recursive { size, overlap, .. } if overlap >= size => {
                Err(ChunkingError::OverlapTooLarge {
                    overlap: *overlap,
                    size: *size,
                })
            }
            Self::Recursive { separators, .. } if separators.is_empty() => {
                Err(ChunkingError::MissingSeparators)
            }
            Self::Recursive { .. } => Ok(()),
        }
    }

    /// Split `text` into ordered, non-empty, trimmed chunks.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ChunkingError> {
        self.validate()?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        if trimmed.chars().count() <= self.threshold() {
            return Ok(vec![trimmed.to_string()]);
        }

        let chunks = match self {
            Self::FixedSize { size, overlap } => fixed::chunk(text, *size, *overlap),
            Self::Semantic { max, min } => semantic::chunk(text, *max, *min),
            Self::Recursive {
                size,
                overlap,
                separators,
            } => recursive::chunk(text, *size, *overlap, separators),
        };
        tracing::debug!(strategy = self.name(), chunks = chunks.len(), "Chunked text");
        Ok(chunks)
    }

    fn threshold(&self) -> usize {
        match self {
            Self::FixedSize { size, .. } | Self::Recursive { size, .. } => *size,
            Self::Semantic { max, .. } => *max,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Whether every non-whitespace character of `input` appears, in order, across `chunks`.
    pub(crate) fn covers(input: &str, chunks: &[String]) -> bool {
        let mut produced = chunks
            .iter()
            .flat_map(|chunk| chunk.chars())
            .filter(|ch| !ch.is_whitespace());
        input
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .all(|expected| produced.any(|ch| ch == expected))
    }

    fn strategies() -> Vec<ChunkStrategy> {
        vec![
            ChunkStrategy::FixedSize {
                size: 60,
                overlap: 15,
            },
            ChunkStrategy::Semantic { max: 80, min: 20 },
            ChunkStrategy::recursive(60, 10),
        ]
    }

    fn sample() -> String {
        let mut text = String::new();
        for idx in 0..12 {
            text.push_str(&format!(
                "Paragraph {idx} covers regional trade. It lists tariffs and quotas! Does it end? "
            ));
            if idx % 3 == 0 {
                text.push_str("\n\n");
            }
        }
        text
    }

    #[test]
    fn empty_and_whitespace_input_yield_no_chunks() {
        for strategy in strategies() {
            assert!(strategy.chunk("").expect("valid strategy").is_empty());
            assert!(strategy.chunk(" \n\t ").expect("valid strategy").is_empty());
        }
    }

    #[test]
    fn short_input_yields_trimmed_single_chunk() {
        for strategy in strategies() {
            let chunks = strategy.chunk("  Short note.\n\nSecond line.  ").expect("valid strategy");
            assert_eq!(chunks, vec!["Short note.\n\nSecond line."], "{}", strategy.name());
        }
    }

    #[test]
    fn every_strategy_covers_the_input() {
        let text = sample();
        for strategy in strategies() {
            let chunks = strategy.chunk(&text).expect("valid strategy");
            assert!(chunks.len() > 1, "{} produced a single chunk", strategy.name());
            assert!(chunks.iter().all(|chunk| !chunk.trim().is_empty()));
            assert!(covers(&text, &chunks), "{} dropped content", strategy.name());
        }
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "Économie ouest-africaine. ".repeat(20);
        for strategy in strategies() {
            let chunks = strategy.chunk(&text).expect("valid strategy");
            assert!(covers(&text, &chunks), "{}", strategy.name());
        }
    }

    #[test]
    fn validation_rejects_impossible_bounds() {
        assert_eq!(
            ChunkStrategy::FixedSize { size: 0, overlap: 0 }.chunk("text"),
            Err(ChunkingError::InvalidChunkSize)
        );
        assert_eq!(
            ChunkStrategy::Semantic { max: 10, min: 20 }.validate(),
            Err(ChunkingError::MinExceedsMax { min: 20, max: 10 })
        );
        assert_eq!(
            ChunkStrategy::recursive(10, 10).validate(),
            Err(ChunkingError::OverlapTooLarge { overlap: 10, size: 10 })
        );
        assert_eq!(
            ChunkStrategy::Recursive {
                size: 10,
                overlap: 0,
                separators: Vec::new()
            }
            .validate(),
            Err(ChunkingError::MissingSeparators)
        );
        assert!(ChunkStrategy::FixedSize { size: 10, overlap: 50 }.validate().is_ok());
    }
}
