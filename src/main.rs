//! `bleak "<prompt>"` - run a clarifying-question conversation in the terminal

use bleak::chat::ChatTransport;
use bleak::resolver::AnswerChangeHandler;
use bleak::{AnsweredQuestion, ChatError, ClientConfig, ElementConfig, RenderedQuestion, Turn, UiSession};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Input = Lines<BufReader<Stdin>>;

/// How a question is asked on the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompter {
    FreeText,
    SingleChoice,
    MultiChoice,
    Scale,
}

/// What the user typed in response to one question
enum Reply {
    Answer(String),
    More,
    Done,
}

fn elements() -> ElementConfig<Prompter> {
    ElementConfig::new()
        .with("text", Prompter::FreeText, "Free-form text answer")
        .with("radio", Prompter::SingleChoice, "Pick exactly one of a few options")
        .with("select", Prompter::SingleChoice, "Pick one from a longer list")
        .with("multi_select", Prompter::MultiChoice, "Pick any number of options")
        .with("slider", Prompter::Scale, "Pick a value on a numeric scale")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bleak=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        eprintln!("usage: bleak \"<prompt>\"");
        eprintln!("  answer each question, or type :more for more questions, :done to finish");
        std::process::exit(2);
    }

    let config = ClientConfig::from_env();
    tracing::info!(url = %config.endpoint_url(), "Starting conversation");
    let mut ui = UiSession::new(&config, elements())?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    match converse(&mut ui, &prompt, &mut input).await {
        Ok(answer) => {
            println!("\n{answer}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    }
}

async fn converse<T: ChatTransport>(
    ui: &mut UiSession<Prompter, T>,
    prompt: &str,
    input: &mut Input,
) -> Result<String, ChatError> {
    let mut turn = ui.start(prompt).await?;

    loop {
        if let Turn::Answer(answer) = turn {
            return Ok(answer);
        }

        let values = Arc::new(Mutex::new(HashMap::new()));
        let sink = Arc::clone(&values);
        let on_change: AnswerChangeHandler = Arc::new(move |question: &str, value: String| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(question.to_string(), value);
        });

        let mut last_reply = Reply::Answer(String::new());
        {
            let rendered = ui
                .components(&HashMap::new(), &on_change)
                .map_err(|e| ChatError::generic(e.to_string()))?;
            for question in &rendered {
                match ask(question, input).await? {
                    Reply::Answer(value) => (question.props.on_change)(value),
                    reply => {
                        last_reply = reply;
                        break;
                    }
                }
            }
        }

        let values = values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let answers = AnsweredQuestion::collect_from(ui.session().pending_questions(), &values);

        turn = match last_reply {
            Reply::Done => return ui.finish(answers).await,
            Reply::More => ui.continue_with(answers, true).await?,
            Reply::Answer(_) => ui.continue_with(answers, false).await?,
        };
    }
}

async fn ask(question: &RenderedQuestion<'_, Prompter>, input: &mut Input) -> Result<Reply, ChatError> {
    let options = question.props.options.as_deref().unwrap_or(&[]);

    println!("\n{}", question.props.text);
    match question.component {
        Prompter::SingleChoice | Prompter::MultiChoice => {
            for (i, option) in options.iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
        }
        Prompter::Scale => {
            if let (Some(low), Some(high)) = (options.first(), options.last()) {
                println!("  ({low} - {high})");
            }
        }
        Prompter::FreeText => {}
    }
    show_prompt(&mut std::io::stdout())?;

    let Some(line) = input
        .next_line()
        .await
        .map_err(|e| ChatError::generic(format!("Failed to read input: {e}")))?
    else {
        return Ok(Reply::Done);
    };

    let line = line.trim();
    Ok(match line {
        ":more" => Reply::More,
        ":done" => Reply::Done,
        _ => Reply::Answer(interpret(*question.component, options, line)),
    })
}

fn show_prompt(out: &mut impl Write) -> Result<(), ChatError> {
    write!(out, "> ")
        .and_then(|()| out.flush())
        .map_err(|e| ChatError::generic(format!("Failed to write prompt: {e}")))
}

/// Map numbered picks back to option text; anything else is taken verbatim
fn interpret(prompter: Prompter, options: &[String], line: &str) -> String {
    let pick = |token: &str| {
        token
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| options.get(i))
            .cloned()
    };

    match prompter {
        Prompter::SingleChoice if line.is_empty() => options.first().cloned().unwrap_or_default(),
        Prompter::SingleChoice => pick(line).unwrap_or_else(|| line.to_string()),
        Prompter::MultiChoice => {
            let picked: Vec<String> = line.split(',').filter_map(pick).collect();
            if picked.is_empty() {
                line.to_string()
            } else {
                picked.join(", ")
            }
        }
        Prompter::FreeText | Prompter::Scale => line.to_string(),
    }
}
