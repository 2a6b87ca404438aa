//! Five-question learning-style quiz.

use crate::profile::LearningStyle;
use std::collections::HashMap;

pub struct QuizOption {
    pub style: LearningStyle,
    pub label: &'static str,
}

pub struct QuizQuestion {
    pub id: u32,
    pub question: &'static str,
    pub options: [QuizOption; 4],
}

const fn opt(style: LearningStyle, label: &'static str) -> QuizOption {
    QuizOption { style, label }
}

use LearningStyle::{Auditory, Kinesthetic, Reading, Visual};

pub static QUESTIONS: [QuizQuestion; 5] = [
    QuizQuestion {
        id: 1,
        question: "How does your child prefer to learn new information?",
        options: [
            opt(Visual, "By seeing pictures, diagrams, or videos"),
            opt(Auditory, "By listening to explanations or discussions"),
            opt(Kinesthetic, "By doing hands-on activities or experiments"),
            opt(Reading, "By reading books or written instructions"),
        ],
    },
    QuizQuestion {
        id: 2,
        question: "When trying to remember something, what does your child do?",
        options: [
            opt(Visual, "Visualize it in their mind"),
            opt(Auditory, "Repeat it out loud or talk through it"),
            opt(Kinesthetic, "Act it out or use physical gestures"),
            opt(Reading, "Write it down or make notes"),
        ],
    },
    QuizQuestion {
        id: 3,
        question: "What activities does your child enjoy most?",
        options: [
            opt(Visual, "Drawing, watching videos, or looking at pictures"),
            opt(Auditory, "Listening to music, talking, or singing"),
            opt(Kinesthetic, "Sports, dancing, or building things"),
            opt(Reading, "Reading books or writing stories"),
        ],
    },
    QuizQuestion {
        id: 4,
        question: "How does your child typically explain things to others?",
        options: [
            opt(Visual, "Shows pictures or draws diagrams"),
            opt(Auditory, "Explains verbally with detailed descriptions"),
            opt(Kinesthetic, "Uses gestures or demonstrates physically"),
            opt(Reading, "Writes it down or refers to written material"),
        ],
    },
    QuizQuestion {
        id: 5,
        question: "When your child is bored, what do they typically do?",
        options: [
            opt(Visual, "Doodle, watch videos, or look at pictures"),
            opt(Auditory, "Talk to someone or listen to music"),
            opt(Kinesthetic, "Move around, play with objects, or exercise"),
            opt(Reading, "Read a book or write something"),
        ],
    },
];

/// Walks the questions in order and records one answer per question id.
#[derive(Debug, Default)]
pub struct Quiz {
    current: usize,
    answers: HashMap<u32, LearningStyle>,
}

impl Quiz {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &'static QuizQuestion {
        &QUESTIONS[self.current]
    }

    pub fn is_last(&self) -> bool {
        self.current == QUESTIONS.len() - 1
    }

    /// Answer (or re-answer) the current question.
    pub fn answer(&mut self, style: LearningStyle) {
        self.answers.insert(self.current_question().id, style);
    }

    pub fn current_answer(&self) -> Option<LearningStyle> {
        self.answers.get(&self.current_question().id).copied()
    }

    /// Advance; returns false when already on the last question.
    pub fn next(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.current += 1;
        true
    }

    pub fn previous(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    pub fn result(&self) -> Option<LearningStyle> {
        dominant_style(self.answers.values().copied())
    }
}

/// Count answers per style and pick the style with the highest count.
///
/// Ties resolve to the earliest style in [`LearningStyle::ALL`]. No answers
/// yields `None`.
pub fn dominant_style(answers: impl IntoIterator<Item = LearningStyle>) -> Option<LearningStyle> {
    let mut counts: HashMap<LearningStyle, usize> = HashMap::new();
    for style in answers {
        *counts.entry(style).or_default() += 1;
    }

    let mut best = None;
    let mut max_count = 0;
    for style in LearningStyle::ALL {
        let count = counts.get(&style).copied().unwrap_or(0);
        if count > max_count {
            max_count = count;
            best = Some(style);
        }
    }
    best
}
