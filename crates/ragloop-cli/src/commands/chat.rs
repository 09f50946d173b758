// Chat command - interactive conversation over a session store
//
// Each line is either a slash command (/new, /list, /switch, /delete,
// /system, /help, /quit) or a question. Questions go to the selected agent;
// with review enabled the draft passes through the revision workflow before
// it is committed to the active session.

use std::path::PathBuf;

use anyhow::{Context, Result};
use futures::StreamExt;
use ragloop_core::{
    AgentConfig, AgentResponse, ConversationStore, ConversationalAgent, RevisionStage,
    RevisionWorkflow, RouteAnnotation,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use uuid::Uuid;

use super::{build_agent, AgentKind, Ports};
use crate::commands::ask::print_details;
use crate::output::{
    print_field, print_fragment, print_table_header, print_table_row, FragmentEcho, OutputFormat,
};
use crate::settings::ProviderSettings;

pub struct ChatOptions {
    pub agent: AgentKind,
    pub docs: Vec<PathBuf>,
    pub review: bool,
    pub search: bool,
}

/// Line-oriented terminal input
struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Show a prompt and read one line; None at end of input
    async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        print_fragment(prompt)?;
        Ok(self.lines.next_line().await?)
    }
}

/// A parsed chat line
#[derive(Debug, PartialEq, Eq)]
enum ChatInput {
    Question(String),
    New,
    List,
    Switch(usize),
    Delete(usize),
    System(String),
    Help,
    Quit,
    Invalid(String),
}

fn parse_input(line: &str) -> Option<ChatInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(ChatInput::Question(line.to_string()));
    };

    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((command, ""));

    let index = |arg: &str| match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(format!("Expected a session number, got '{}'", arg)),
    };

    Some(match name {
        "new" => ChatInput::New,
        "list" => ChatInput::List,
        "switch" => index(arg).map_or_else(ChatInput::Invalid, ChatInput::Switch),
        "delete" => index(arg).map_or_else(ChatInput::Invalid, ChatInput::Delete),
        "system" => ChatInput::System(arg.to_string()),
        "help" => ChatInput::Help,
        "quit" | "exit" => ChatInput::Quit,
        other => ChatInput::Invalid(format!("Unknown command '/{}'", other)),
    })
}

struct Chat {
    store: ConversationStore,
    workflow: RevisionWorkflow,
    agent: Option<Box<dyn ConversationalAgent>>,
    ports: Ports,
    config: AgentConfig,
    review: bool,
    search: bool,
    quiet: bool,
    output: OutputFormat,
}

pub async fn run(
    settings: &ProviderSettings,
    config: AgentConfig,
    options: ChatOptions,
    output: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let ports = Ports::from_settings(settings)?;
    let agent = build_agent(options.agent, &ports, &config, &options.docs)?;

    if options.search && ports.web_search.is_none() {
        println!("Web search tool is not configured. Check the Tavily API key.");
    }

    let mut chat = Chat {
        store: ConversationStore::new(),
        workflow: RevisionWorkflow::new(),
        review: options.review || agent.is_none(),
        agent,
        ports,
        config,
        search: options.search,
        quiet,
        output,
    };
    let mut input = Prompter::new();

    if !quiet {
        println!("ragloop chat ({} agent). Type /help for commands.", agent_label(options.agent));
    }

    while let Some(line) = input.ask("\n> ").await? {
        let Some(parsed) = parse_input(&line) else {
            continue;
        };
        match parsed {
            ChatInput::Quit => break,
            ChatInput::Question(question) => chat.turn(&question, &mut input).await?,
            other => chat.command(other)?,
        }
    }

    Ok(())
}

fn agent_label(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Router => "router",
        AgentKind::Rag => "rag",
        AgentKind::Plain => "plain",
    }
}

impl Chat {
    fn command(&mut self, input: ChatInput) -> Result<()> {
        match input {
            ChatInput::New => {
                self.store.create_session();
                println!("Started a new conversation.");
            }
            ChatInput::List => self.list()?,
            ChatInput::Switch(n) => match self.session_at(n) {
                Some(id) => {
                    self.store.switch_to(id)?;
                    println!("Switched to: {}", self.store.active().title);
                }
                None => println!("No session #{}", n),
            },
            ChatInput::Delete(n) => match self.session_at(n) {
                Some(id) => match self.store.delete(id) {
                    Ok(()) => {
                        println!("Deleted. Active: {}", self.store.active().title);
                    }
                    Err(e) => println!("{}", e),
                },
                None => println!("No session #{}", n),
            },
            ChatInput::System(prompt) => {
                self.store.active_mut().set_system_prompt(prompt);
                match self.store.active().system_prompt() {
                    Some(prompt) => println!("System prompt set: {}", prompt),
                    None => println!("System prompt cleared."),
                }
            }
            ChatInput::Help => print_help(),
            ChatInput::Invalid(message) => println!("{}", message),
            ChatInput::Question(_) | ChatInput::Quit => {}
        }
        Ok(())
    }

    /// Id of the n-th session in `/list` order
    fn session_at(&self, n: usize) -> Option<Uuid> {
        self.store.list().get(n - 1).map(|s| s.id)
    }

    fn list(&self) -> Result<()> {
        let sessions = self.store.list();
        if !self.output.is_text() {
            return self.output.print_value(&sessions);
        }

        print_table_header(&[("#", 3), ("", 1), ("TITLE", 34), ("MESSAGES", 8), ("CREATED", 19)]);
        for (i, session) in sessions.iter().enumerate() {
            let number = (i + 1).to_string();
            let marker = if session.id == self.store.active_id() {
                "*"
            } else {
                ""
            };
            let count = session.len().to_string();
            let created = session.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
            print_table_row(&[
                (number.as_str(), 3),
                (marker, 1),
                (session.title.as_str(), 34),
                (count.as_str(), 8),
                (created.as_str(), 19),
            ]);
        }
        Ok(())
    }

    async fn turn(&mut self, question: &str, input: &mut Prompter) -> Result<()> {
        if !self.workflow.accepts_input() {
            println!("Finish reviewing the current answer first.");
            return Ok(());
        }

        match &self.agent {
            None => self.draft_plain(question).await?,
            Some(agent) => {
                let history = self.store.active().messages().to_vec();
                if self.review {
                    let response = agent.invoke(question, &history).await;
                    self.hold_agent_draft(question, &response)?;
                } else {
                    let mut streamed = agent.stream(question, &history).await;
                    if self.output.is_text() {
                        while let Some(fragment) = streamed.fragments.next().await {
                            print_fragment(&fragment)?;
                        }
                        println!();
                        if !self.quiet {
                            print_details(&streamed.response);
                        }
                    } else {
                        self.output.print_value(&streamed.response)?;
                    }
                    self.store.active_mut().commit_response(&streamed.response);
                    return Ok(());
                }
            }
        }

        self.review_draft(input).await
    }

    /// Stream a draft straight from the LLM into the workflow
    async fn draft_plain(&mut self, question: &str) -> Result<()> {
        let web_search = if self.search {
            self.ports.web_search.as_deref()
        } else {
            None
        };

        let mut echo = FragmentEcho::stdout();
        let result = self
            .workflow
            .submit(
                self.store.active_mut(),
                question,
                self.ports.llm.as_ref(),
                &self.config,
                web_search,
                |delta| echo.write(delta),
            )
            .await;
        echo.finish().context("Failed to write the draft")?;
        println!();

        if let Err(e) = result {
            println!("Could not draft an answer: {}", e);
        }
        Ok(())
    }

    /// Hold an agent's answer for review, keeping its annotations
    fn hold_agent_draft(&mut self, question: &str, response: &AgentResponse) -> Result<()> {
        let session = self.store.active_mut();
        let index = session.len();
        self.workflow
            .submit_draft(session, question, response.answer.clone())?;

        if let Some(evidence) = response.evidence.as_ref().filter(|e| !e.is_empty()) {
            session.annotate_search(index, evidence.clone());
        }
        if let Some(route) = response.route {
            session.annotate_route(
                index,
                RouteAnnotation {
                    route,
                    reason: response.routing_reason.clone().unwrap_or_default(),
                },
            );
        }

        println!("{}", response.answer);
        if !self.quiet {
            print_details(response);
        }
        Ok(())
    }

    /// Drive the revision workflow until the draft is committed or dropped
    async fn review_draft(&mut self, input: &mut Prompter) -> Result<()> {
        while !self.workflow.accepts_input() {
            let outcome = match self.workflow.stage() {
                RevisionStage::Validate => self.review_validate(input).await?,
                RevisionStage::Correct => self.review_correct(input).await?,
                RevisionStage::Rewrite => self.review_rewrite(input).await?,
                RevisionStage::User => Step::Continue,
            };
            if outcome == Step::EndOfInput {
                self.workflow.discard(self.store.active_mut())?;
                break;
            }
        }
        Ok(())
    }

    async fn review_validate(&mut self, input: &mut Prompter) -> Result<Step> {
        let Some(choice) = input
            .ask("\n[a]ccept  [e]dit sentences  [r]ewrite  [d]iscard > ")
            .await?
        else {
            return Ok(Step::EndOfInput);
        };

        let result = match choice.trim() {
            "a" => self
                .workflow
                .accept(self.store.active_mut())
                .map(|_| println!("Answer saved.")),
            "e" => self.workflow.edit_sentences(),
            "r" => self.workflow.request_rewrite(),
            "d" => self
                .workflow
                .discard(self.store.active_mut())
                .map(|_| println!("Draft discarded.")),
            _ => Ok(()),
        };
        if let Err(e) = result {
            println!("{}", e);
        }
        Ok(Step::Continue)
    }

    async fn review_correct(&mut self, input: &mut Prompter) -> Result<Step> {
        let Some(index) = self.workflow.focus() else {
            print_field("Answer", self.workflow.sentences().join(" ").as_str());
            let Some(choice) = input.ask("\n[a]ccept  [r]edo all > ").await? else {
                return Ok(Step::EndOfInput);
            };
            let result = match choice.trim() {
                "a" => self
                    .workflow
                    .accept(self.store.active_mut())
                    .map(|_| println!("Answer saved.")),
                "r" => self.workflow.redo_all(),
                _ => Ok(()),
            };
            if let Err(e) = result {
                println!("{}", e);
            }
            return Ok(Step::Continue);
        };

        let total = self.workflow.sentences().len();
        println!(
            "\nSentence {}/{}: {}",
            index + 1,
            total,
            self.workflow.sentences()[index]
        );
        let Some(choice) = input.ask("[u]pdate  [d]elete  [s]kip > ").await? else {
            return Ok(Step::EndOfInput);
        };

        let result = match choice.trim() {
            "u" => {
                let Some(text) = input.ask("New sentence > ").await? else {
                    return Ok(Step::EndOfInput);
                };
                self.workflow.update_sentence(&text)
            }
            "d" => self.workflow.delete_sentence(),
            "s" => self.workflow.skip_sentence(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            println!("{}", e);
        }
        Ok(Step::Continue)
    }

    async fn review_rewrite(&mut self, input: &mut Prompter) -> Result<Step> {
        let Some(text) = input
            .ask("\nReplacement answer (/cancel to go back) > ")
            .await?
        else {
            return Ok(Step::EndOfInput);
        };

        let result = if text.trim() == "/cancel" {
            self.workflow.cancel_rewrite()
        } else {
            self.workflow
                .commit_rewrite(self.store.active_mut(), &text)
                .map(|_| println!("Answer saved."))
        };
        if let Err(e) = result {
            println!("{}", e);
        }
        Ok(Step::Continue)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    EndOfInput,
}

fn print_help() {
    println!("Commands:");
    println!("  /new            start a new conversation");
    println!("  /list           list conversations");
    println!("  /switch <n>     switch to conversation n");
    println!("  /delete <n>     delete conversation n");
    println!("  /system <text>  set the system prompt (empty clears it)");
    println!("  /quit           exit");
    println!("Anything else is sent as a question.");
}
