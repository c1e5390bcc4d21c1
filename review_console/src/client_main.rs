use std::fmt;
use std::io;
use std::net::TcpStream;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self as term_event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{self, Stylize};
use crossterm::{cursor, execute, terminal};
use instant::Instant;
use log::{info, warn};
use scopeguard::defer;
use tungstenite::WebSocket;

use goban_review::client::{ClientState, ConnectionMode, Key, Modal, Modifiers, NotableEvent, RECONNECTING_MESSAGE};
use goban_review::coord::{BoardSize, Coord};
use goban_review::event::{NavKey, RawCoord, ReviewSettings};
use goban_review::review::ViewUpdate;

use crate::config::ClientConfig;
use crate::network;
use crate::tui;


const TICK_INTERVAL: Duration = Duration::from_millis(100);

enum IncomingEvent {
    Network(String),
    Disconnected(String),
    Terminal(term_event::Event),
    Tick,
}

enum CommandOutcome {
    Continue,
    Quit,
}

fn writeln_raw(stdout: &mut io::Stdout, v: impl fmt::Display) -> io::Result<()> {
    let s = v.to_string();
    // Note. Not using `lines()` because it removes trailing new line.
    for line in s.split('\n') {
        execute!(
            stdout,
            style::Print(line),
            terminal::Clear(terminal::ClearType::UntilNewLine),
            cursor::MoveToNextLine(1),
            cursor::Hide
        )?;
    }
    Ok(())
}

fn render(
    stdout: &mut io::Stdout, client: &ClientState, keyboard_input: &str, message: &Option<String>,
) -> io::Result<()> {
    execute!(stdout, cursor::MoveTo(0, 0))?;
    writeln_raw(stdout, tui::render_board(client.review()))?;
    writeln_raw(stdout, tui::render_status(client))?;
    writeln_raw(stdout, "")?;
    if client.mode() == ConnectionMode::Shared && !client.is_connected() {
        writeln_raw(stdout, RECONNECTING_MESSAGE.with(style::Color::Yellow))?;
    } else if !client.modals().is_empty() {
        let modals = format!("{:?} (Esc to close)", client.modals());
        writeln_raw(stdout, modals.with(style::Color::Yellow))?;
    }
    writeln_raw(stdout, keyboard_input.with(style::Color::White))?;
    if let Some(msg) = message {
        writeln_raw(stdout, msg.clone().with(style::Color::Magenta))?;
    }
    execute!(stdout, terminal::Clear(terminal::ClearType::FromCursorDown))?;
    Ok(())
}

fn spawn_reader(mut socket_in: WebSocket<TcpStream>, tx: mpsc::Sender<IncomingEvent>) {
    thread::spawn(move || {
        loop {
            match network::read_message(&mut socket_in) {
                Ok(text) => {
                    if tx.send(IncomingEvent::Network(text)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send(IncomingEvent::Disconnected(format!("{err:?}")));
                    return;
                }
            }
        }
    });
}

fn connect(
    url: &str, client: &mut ClientState, tx: &mpsc::Sender<IncomingEvent>,
) -> Option<WebSocket<TcpStream>> {
    match network::connect(url) {
        Ok((socket_in, socket_out)) => {
            spawn_reader(socket_in, tx.clone());
            client.connection_established();
            Some(socket_out)
        }
        Err(err) => {
            warn!("{err:#}");
            client.connection_lost(Instant::now());
            None
        }
    }
}

fn board_point(size: BoardSize, arg: &str) -> Result<RawCoord, String> {
    Coord::from_letters(arg.trim())
        .filter(|pos| size.contains(*pos))
        .map(RawCoord::from)
        .ok_or_else(|| format!("Not a board point: '{arg}'"))
}

fn run_command(client: &mut ClientState, cmd: &str) -> Result<CommandOutcome, String> {
    let (name, arg) = cmd.split_once(' ').unwrap_or((cmd, ""));
    let arg = arg.trim();
    let size = client.review().size();
    match name {
        "quit" => return Ok(CommandOutcome::Quit),
        "play" => client.click(board_point(size, arg)?, Modifiers::default()),
        "alt" => client.click(board_point(size, arg)?, Modifiers { shift: true, ..Modifiers::default() }),
        "pass" => client.pass(),
        "rewind" => client.rewind(),
        "end" => client.fastforward(),
        "cut" => client.scissors(),
        "trash" => client.trash(),
        "erase" => client.erase_pen(),
        "comment" => client.comment(arg.to_owned()),
        "fetch" => client.request_sgf(arg.to_owned()),
        "ogs" => client.link_ogs_game(arg.to_owned()),
        "password" => client.check_password(arg.to_owned()),
        "upload" => {
            let text = std::fs::read_to_string(arg).map_err(|err| format!("Cannot read '{arg}': {err}"))?;
            client.upload_sgf(&text);
        }
        "save" => {
            std::fs::write(arg, client.review().to_sgf()).map_err(|err| format!("Cannot write '{arg}': {err}"))?;
        }
        "buffer" | "size" => {
            let value: i64 = arg.parse().map_err(|_| format!("Not a number: '{arg}'"))?;
            let review = client.review();
            let mut settings = ReviewSettings {
                buffer: review.buffer(),
                size: review.size().into(),
                password: review.password().to_owned(),
            };
            if name == "buffer" {
                settings.buffer = value;
            } else {
                settings.size = u8::try_from(value).map_err(|_| format!("Bad board size: {value}"))?;
            }
            client.update_settings(settings);
        }
        "branch" => {
            let branch_jump = !client.branch_jump();
            client.set_branch_jump(branch_jump);
        }
        _ => return Err(format!("Unknown command: '{cmd}'")),
    }
    Ok(CommandOutcome::Continue)
}

fn key_modifiers(modifiers: KeyModifiers) -> Modifiers {
    Modifiers {
        shift: modifiers.contains(KeyModifiers::SHIFT),
        ctrl: modifiers.contains(KeyModifiers::CONTROL),
        alt: modifiers.contains(KeyModifiers::ALT),
    }
}

pub fn run(config: ClientConfig, mode: ConnectionMode) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();
    let (server_tx, server_rx) = mpsc::channel();
    let mut client = ClientState::new(mode, config.client_options(), server_tx);
    info!(
        "Keepalive every {}, reconnect after {}",
        humantime::format_duration(config.keepalive_interval),
        humantime::format_duration(config.reconnect_backoff)
    );
    let mut socket_out = match mode {
        ConnectionMode::Shared => connect(&config.url, &mut client, &tx),
        ConnectionMode::Local => None,
    };

    let mut stdout = io::stdout();
    terminal::enable_raw_mode()?;
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
    defer! {
        let _ = execute!(io::stdout(), terminal::LeaveAlternateScreen, cursor::Show);
        let _ = terminal::disable_raw_mode();
    };

    let tx_local = tx.clone();
    let tx_tick = tx.clone();
    thread::spawn(move || {
        while let Ok(ev) = term_event::read() {
            if tx_local.send(IncomingEvent::Terminal(ev)).is_err() {
                return;
            }
        }
    });
    thread::spawn(move || {
        loop {
            thread::sleep(TICK_INTERVAL);
            if tx_tick.send(IncomingEvent::Tick).is_err() {
                return;
            }
        }
    });

    let mut keyboard_input = String::new();
    let mut message = None;
    for event in rx.iter() {
        match event {
            IncomingEvent::Network(text) => match client.process_server_message(&text) {
                Ok(NotableEvent::Toast(msg)) => message = Some(msg),
                Ok(NotableEvent::PasswordRequired) => {
                    message = Some("The room is protected: /password <password> to edit".to_owned());
                }
                Ok(NotableEvent::None | NotableEvent::BoardUpdated | NotableEvent::UsersChanged) => {}
                Err(err) => message = Some(err.to_string()),
            },
            IncomingEvent::Disconnected(reason) => {
                warn!("Connection lost: {reason}");
                socket_out = None;
                client.connection_lost(Instant::now());
            }
            IncomingEvent::Terminal(term_event::Event::Key(key)) if key.kind != KeyEventKind::Release => {
                let modifiers = key_modifiers(key.modifiers);
                match key.code {
                    KeyCode::Char(ch) if !keyboard_input.is_empty() => keyboard_input.push(ch),
                    KeyCode::Char('/') => keyboard_input.push('/'),
                    KeyCode::Char(ch) if ch.is_ascii_digit() => {
                        client.key_down(Key::Digit(ch as u8 - b'0'), modifiers);
                    }
                    KeyCode::Left => client.key_down(Key::Arrow(NavKey::ArrowLeft), modifiers),
                    KeyCode::Right => client.key_down(Key::Arrow(NavKey::ArrowRight), modifiers),
                    KeyCode::Up => client.key_down(Key::Arrow(NavKey::ArrowUp), modifiers),
                    KeyCode::Down => client.key_down(Key::Arrow(NavKey::ArrowDown), modifiers),
                    KeyCode::Backspace => {
                        keyboard_input.pop();
                    }
                    KeyCode::Esc => {
                        keyboard_input.clear();
                        for modal in [Modal::Error, Modal::Password, Modal::Upload, Modal::Settings] {
                            client.close_modal(modal);
                        }
                    }
                    KeyCode::Enter => {
                        if let Some(cmd) = keyboard_input.strip_prefix('/') {
                            match run_command(&mut client, cmd) {
                                Ok(CommandOutcome::Quit) => return Ok(()),
                                Ok(CommandOutcome::Continue) => message = None,
                                Err(err) => message = Some(err),
                            }
                        }
                        keyboard_input.clear();
                    }
                    _ => {}
                }
            }
            IncomingEvent::Terminal(_) => {}
            IncomingEvent::Tick => {
                // Any event triggers repaint, so no additional action is required.
            }
        }

        let now = Instant::now();
        if mode == ConnectionMode::Shared && socket_out.is_none() && client.should_reconnect(now) {
            socket_out = connect(&config.url, &mut client, &tx);
        }
        client.refresh(now);
        for outgoing in server_rx.try_iter() {
            let Some(socket) = socket_out.as_mut() else {
                continue;
            };
            if let Err(err) = network::write_event(socket, &outgoing) {
                warn!("Cannot send {}: {err:?}", outgoing.name());
                socket_out = None;
                client.connection_lost(now);
            }
        }
        let updates = client.review_mut().take_view_updates();
        if updates.iter().any(|u| matches!(u, ViewUpdate::Reset { .. })) {
            execute!(stdout, terminal::Clear(terminal::ClearType::All))?;
        }
        render(&mut stdout, &client, &keyboard_input, &message)?;
    }
    anyhow::bail!("Unexpected end of events stream")
}
