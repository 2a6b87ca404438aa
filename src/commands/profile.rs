use crate::db::Database;
use crate::profile::{LearnerProfile, LearningStyle, RegistrationForm};
use crate::quiz::Quiz;
use anyhow::{anyhow, Result};
use std::io::{BufRead, Write};
use tracing::info;

/// Validate the registration form and store the profile.
pub fn register(db: &Database, form: &RegistrationForm) -> Result<LearnerProfile> {
    let profile = form.validate().map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow!("Invalid registration:\n  {}", messages.join("\n  "))
    })?;
    db.save_profile(&profile)?;
    info!(name = %profile.name, style = %profile.learning_style, "Learner registered");
    Ok(profile)
}

enum QuizInput {
    Answer(usize),
    Next,
    Previous,
    Quit,
    Unknown,
}

fn parse_input(line: &str) -> QuizInput {
    match line.trim().to_ascii_lowercase().as_str() {
        "n" | "next" => QuizInput::Next,
        "p" | "prev" | "previous" => QuizInput::Previous,
        "q" | "quit" => QuizInput::Quit,
        other => match other.parse::<usize>() {
            Ok(n) if (1..=4).contains(&n) => QuizInput::Answer(n - 1),
            _ => QuizInput::Unknown,
        },
    }
}

fn print_question(quiz: &Quiz, out: &mut impl Write) -> std::io::Result<()> {
    let question = quiz.current_question();
    writeln!(out)?;
    writeln!(out, "Question {} of {}", quiz.current_index() + 1, crate::quiz::QUESTIONS.len())?;
    writeln!(out, "{}", question.question)?;
    for (i, option) in question.options.iter().enumerate() {
        let mark = if quiz.current_answer() == Some(option.style) { "*" } else { " " };
        writeln!(out, " {} {}. {}", mark, i + 1, option.label)?;
    }
    write!(out, "[1-4] answer, [n]ext, [p]revious, [q]uit > ")?;
    out.flush()
}

/// Run the learning-style quiz interactively.
///
/// Answering moves on to the next question; answering the last one
/// finishes the quiz, shows the result and stores it. Returns `None` if
/// the user quits or input ends first.
pub fn run_quiz(db: &Database, input: impl BufRead, mut out: impl Write) -> Result<Option<LearningStyle>> {
    let mut quiz = Quiz::new();
    let mut lines = input.lines();

    loop {
        print_question(&quiz, &mut out)?;
        let Some(line) = lines.next() else {
            writeln!(out)?;
            return Ok(None);
        };

        match parse_input(&line?) {
            QuizInput::Answer(i) => {
                quiz.answer(quiz.current_question().options[i].style);
                if quiz.is_last() {
                    break;
                }
                quiz.next();
            }
            QuizInput::Next => {
                if quiz.current_answer().is_none() {
                    writeln!(out, "Please choose an answer first.")?;
                } else if quiz.is_last() {
                    break;
                } else {
                    quiz.next();
                }
            }
            QuizInput::Previous => {
                quiz.previous();
            }
            QuizInput::Quit => return Ok(None),
            QuizInput::Unknown => writeln!(out, "Please enter a number from 1 to 4, n, p or q.")?,
        }
    }

    let Some(style) = quiz.result() else {
        return Ok(None);
    };
    writeln!(out)?;
    writeln!(out, "Your Learning Style: {}", style.label())?;
    writeln!(out, "{}", style.description())?;
    writeln!(out)?;
    writeln!(out, "What this means for your child's learning:")?;
    for tip in style.tips() {
        writeln!(out, "  - {}", tip)?;
    }

    if db.update_learning_style(style)? {
        info!(style = %style, "Learning style updated from quiz");
        writeln!(out, "Your profile has been updated.")?;
    } else {
        writeln!(out, "No profile found. Run `ai-tutor register` to save it.")?;
    }
    Ok(Some(style))
}
