use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io;
use std::sync::Mutex;
use wellness_chat::wellness::{tip_for, Category};
use wellness_chat::{ChatEngine, ChatRequest, KnowledgeBase, ReplyKind, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Chat,
    Tips,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Chat => Page::Tips,
            Page::Tips => Page::Chat,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Chat => "Chat",
            Page::Tips => "Wellness Tips",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Bot,
    System,
}

#[derive(Debug, Clone)]
pub struct ChatLine {
    pub speaker: Speaker,
    pub text: String,
}

pub struct App {
    engine: ChatEngine,
    db: Mutex<Connection>,
    knowledge: KnowledgeBase,
    pub user: Option<String>,
    pub language: Option<String>,
    pub lines: Vec<ChatLine>,
    pub input: String,
    pub current_page: Page,
    pub scroll: u16,
    pub last_status: String,
}

impl App {
    pub fn new(
        engine: ChatEngine,
        conn: Connection,
        knowledge: KnowledgeBase,
        user: Option<String>,
        language: Option<String>,
    ) -> Self {
        let mut app = Self {
            engine,
            db: Mutex::new(conn),
            knowledge,
            user,
            language,
            lines: Vec::new(),
            input: String::new(),
            current_page: Page::Chat,
            scroll: 0,
            last_status: String::new(),
        };
        app.load_previous_turns();
        app
    }

    /// Seed the transcript with the user's stored history, if any
    fn load_previous_turns(&mut self) {
        let Some(username) = self.user.clone() else {
            self.push(Speaker::System, "Chatting as guest. Nothing will be saved.");
            return;
        };

        let history = match self.db.lock() {
            Ok(conn) => self.engine.history(&conn, &username, None),
            Err(_) => return,
        };

        match history {
            Ok(history) => {
                for turn in history.turns {
                    let speaker = match turn.sender {
                        Sender::User => Speaker::User,
                        Sender::Bot => Speaker::Bot,
                    };
                    self.push(speaker, &turn.message);
                }
                self.push(Speaker::System, &format!("Welcome back, {}.", username));
            }
            Err(_) => {
                self.push(
                    Speaker::System,
                    &format!("No account named {}, chatting as guest.", username),
                );
            }
        }
    }

    fn push(&mut self, speaker: Speaker, text: &str) {
        self.lines.push(ChatLine {
            speaker,
            text: text.to_string(),
        });
    }

    /// Send the current input through the chat engine
    pub fn submit(&mut self) {
        let message = self.input.trim().to_string();
        self.input.clear();
        if message.is_empty() {
            return;
        }

        self.push(Speaker::User, &message);

        let request = ChatRequest {
            user: self.user.clone(),
            message,
            language: self.language.clone(),
        };

        match self.engine.handle(&self.db, &self.knowledge, &request) {
            Ok(reply) => {
                self.last_status = match reply.kind {
                    ReplyKind::Answer => format!("match {:.2}", reply.score),
                    ReplyKind::NoMatch => format!("no match (best {:.2})", reply.score),
                    ReplyKind::KnowledgeBaseEmpty => "knowledge base empty".to_string(),
                };
                if !reply.session.is_guest() && !reply.persisted {
                    self.last_status.push_str(" | not saved");
                }
                self.push(Speaker::Bot, &reply.response);
            }
            Err(e) => {
                self.last_status = "error".to_string();
                self.push(Speaker::System, &format!("Error: {}", e));
            }
        }
        self.scroll = 0;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_add(1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(())
                }
                KeyCode::Tab => app.next_page(),
                KeyCode::Enter if app.current_page == Page::Chat => app.submit(),
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Up | KeyCode::PageUp => app.scroll_up(),
                KeyCode::Down | KeyCode::PageDown => app.scroll_down(),
                KeyCode::Char(c) if app.current_page == Page::Chat => app.input.push(c),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Transcript or tips
            Constraint::Length(3), // Input box
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Chat => render_transcript(f, chunks[1], app),
        Page::Tips => render_tips(f, chunks[1]),
    }

    render_input(f, chunks[2], app);
    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Chat, Page::Tips].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("User: {}", app.user.as_deref().unwrap_or("guest")),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Lang: {}", app.language.as_deref().unwrap_or("default")),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("KB: {}", app.knowledge.len()),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_transcript(f: &mut Frame, area: Rect, app: &App) {
    let lines: Vec<Line> = app
        .lines
        .iter()
        .map(|line| {
            let (label, color) = match line.speaker {
                Speaker::User => ("You", Color::Yellow),
                Speaker::Bot => ("Bot", Color::Green),
                Speaker::System => ("--", Color::DarkGray),
            };
            Line::from(vec![
                Span::styled(
                    format!("{}: ", label),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(line.text.clone()),
            ])
        })
        .collect();

    // keep the newest lines in view; scroll moves back in time
    let visible = area.height.saturating_sub(2);
    let total = lines.len() as u16;
    let offset = total.saturating_sub(visible).saturating_sub(app.scroll);

    let transcript = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Conversation "),
        );

    f.render_widget(transcript, area);
}

fn render_tips(f: &mut Frame, area: Rect) {
    let rotation = chrono::Utc::now().timestamp() as usize / 86_400;
    let mut lines = vec![];

    for category in ["hydration", "sleep", "nutrition", "stress"] {
        let tip = tip_for(category, rotation);
        lines.push(Line::from(Span::styled(
            category.to_uppercase(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(format!("  {}", tip.tip)));
        if let Some(known) = Category::parse(category) {
            for citation in known.citations() {
                lines.push(Line::from(Span::styled(
                    format!("  {} ({})", citation.label, citation.url),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled(
        wellness_chat::wellness::SAFETY_NOTE,
        Style::default().fg(Color::Red),
    )));

    let tips = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Wellness Tips "),
    );

    f.render_widget(tips, area);
}

fn render_input(f: &mut Frame, area: Rect, app: &App) {
    let input = Paragraph::new(app.input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Message "),
    );

    f.render_widget(input, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if !app.last_status.is_empty() {
        status_spans.push(Span::styled(
            format!(" {} ", app.last_status),
            Style::default().fg(Color::Cyan),
        ));
        status_spans.push(Span::raw(" | "));
    }

    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Send | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Scroll | "));
    status_spans.push(Span::styled("Esc", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}
