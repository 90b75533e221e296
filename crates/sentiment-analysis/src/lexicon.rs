use std::collections::HashSet;

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly",
    "barely", "neither", "nor", "without",
];

const NEGATION_WINDOW: usize = 3;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "gains", "profit", "growth", "beat", "beats",
    "upgrade", "outperform", "strong", "positive", "rise", "rises", "increase",
    "breakthrough", "innovation", "success", "exceed", "exceeds", "momentum",
    "buy", "recommend", "optimistic", "record", "high", "advance",
    // Financial-specific terms
    "dividend", "buyback", "repurchase", "accretive", "upside",
    "recovery", "rebound", "expansion", "robust", "accelerating",
    "overweight", "raised", "upgraded", "outpacing", "tailwind", "undervalued",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "loss", "losses", "fall", "falls", "plunge", "crash", "miss", "misses",
    "downgrade", "underperform", "weak", "negative", "drop", "drops", "decrease",
    "concern", "risk", "fail", "disappoint", "slump", "sell",
    "warning", "pessimistic", "low", "retreat", "fear", "trouble",
    // Financial-specific terms
    "dilution", "dilutive", "headwind", "lawsuit", "litigation",
    "recall", "investigation", "probe", "default", "bankruptcy",
    "restructuring", "layoff", "layoffs", "downside", "overvalued", "bubble",
    "underweight", "lowered", "suspended", "downgraded",
];

/// Normalisation constant of the compound transform; a raw hit count of
/// about 4 maps to roughly 0.7.
const COMPOUND_ALPHA: f64 = 15.0;

/// Squash an unbounded raw score into (-1, 1).
pub fn compound(raw: f64) -> f64 {
    raw / (raw * raw + COMPOUND_ALPHA).sqrt()
}

/// Word-list polarity scorer for financial headlines.
pub struct HeadlineScorer {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl HeadlineScorer {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }

    /// Raw signed hit count plus the number of lexicon hits.
    fn raw_score(&self, text: &str) -> (f64, usize) {
        let text_lower = text.to_lowercase();
        let words: Vec<&str> = text_lower
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':' | '"' | '(' | ')'))
            .filter(|w| !w.is_empty())
            .collect();

        let negation_positions: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.negation.contains(*w))
            .map(|(i, _)| i)
            .collect();

        let mut score: i32 = 0;
        let mut hits = 0;

        for (i, word) in words.iter().enumerate() {
            let is_positive = self.positive.contains(*word);
            let is_negative = self.negative.contains(*word);

            if !is_positive && !is_negative {
                continue;
            }
            hits += 1;

            // Negation within NEGATION_WINDOW words before flips polarity
            let negated = negation_positions
                .iter()
                .any(|&neg_pos| neg_pos < i && (i - neg_pos) <= NEGATION_WINDOW);

            let polarity = if is_positive { 1 } else { -1 };
            score += if negated { -polarity } else { polarity };
        }

        (score as f64, hits)
    }

    /// Compound polarity of one text, `None` when no lexicon word occurs.
    pub fn score_text(&self, text: &str) -> Option<f64> {
        let (raw, hits) = self.raw_score(text);
        (hits > 0).then(|| compound(raw))
    }

    /// Score an article from its headline and optional summary.
    pub fn score_article(&self, title: &str, description: Option<&str>) -> Option<f64> {
        let text = match description {
            Some(desc) if !desc.trim().is_empty() => format!("{}. {}", title, desc),
            _ => title.to_string(),
        };
        self.score_text(&text)
    }

    /// Mean compound polarity over the scorable articles; 0.0 when none are.
    pub fn score_articles<'a, I>(&self, articles: I) -> (f64, usize)
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let scores: Vec<f64> = articles
            .into_iter()
            .filter_map(|(title, desc)| self.score_article(title, desc))
            .collect();
        let count = scores.len();
        let mean = analysis_core::stats::mean(&scores).unwrap_or(0.0);
        (mean, count)
    }
}

impl Default for HeadlineScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_is_bounded_and_odd() {
        assert_eq!(compound(0.0), 0.0);
        assert!(compound(100.0) < 1.0);
        assert!(compound(-100.0) > -1.0);
        assert!((compound(2.0) + compound(-2.0)).abs() < 1e-12);
        assert!((compound(1.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_positive_headline() {
        let scorer = HeadlineScorer::new();
        let s = scorer.score_text("Chipmaker beats estimates, shares surge to record high").unwrap();
        assert!(s > 0.1, "got {}", s);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let scorer = HeadlineScorer::new();
        let plain = scorer.score_text("results were strong").unwrap();
        let negated = scorer.score_text("results were not strong").unwrap();
        assert!(plain > 0.0);
        assert!(negated < 0.0);
    }

    #[test]
    fn test_negation_window_is_limited() {
        let scorer = HeadlineScorer::new();
        // "no" is four words before "growth"
        let s = scorer.score_text("no one expected this much growth").unwrap();
        assert!(s > 0.0);
    }

    #[test]
    fn test_text_without_hits_is_unscorable() {
        let scorer = HeadlineScorer::new();
        assert_eq!(scorer.score_text("Company to hold annual meeting on Tuesday"), None);
        assert_eq!(scorer.score_text(""), None);
    }

    #[test]
    fn test_average_skips_unscorable_articles() {
        let scorer = HeadlineScorer::new();
        let articles = vec![
            ("Shares plunge after lawsuit", None),
            ("Board meeting scheduled", Some("Agenda published")),
        ];
        let (mean, count) = scorer.score_articles(articles);
        assert_eq!(count, 1);
        assert!(mean < -0.1);
    }

    #[test]
    fn test_no_articles_is_neutral() {
        let scorer = HeadlineScorer::new();
        let (mean, count) = scorer.score_articles(Vec::<(&str, Option<&str>)>::new());
        assert_eq!(mean, 0.0);
        assert_eq!(count, 0);
    }
}
