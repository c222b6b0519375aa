use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::api::ChatApi;
use crate::chat::ChatClient;
use crate::config::Config;
use crate::login::LoginForm;
use crate::session::{Session, SessionGuard, SharedStore};

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub enum Screen {
    Login(LoginForm),
    Chat(ChatClient),
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub screen: Screen,

    api: Arc<dyn ChatApi>,
    store: SharedStore,
    chat_id: i64,
    refresh_interval: Duration,
    last_refresh: Instant,
}

impl App {
    /// Runs the session guard: a stored session opens the chat screen,
    /// anything else the login screen.
    pub fn new(config: &Config, api: Arc<dyn ChatApi>, store: SharedStore) -> Self {
        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            screen: Screen::Login(LoginForm::default()),

            api,
            store,
            chat_id: config.chat_id,
            refresh_interval: config.refresh_interval(),
            last_refresh: Instant::now(),
        };

        match SessionGuard::check(&app.store) {
            Some(session) => app.open_chat(session),
            None => info!("no stored session, showing login"),
        }

        app
    }

    fn open_chat(&mut self, session: Session) {
        let mut client = ChatClient::new(Arc::clone(&self.api), Arc::clone(&self.store), session, self.chat_id);
        client.start();
        self.screen = Screen::Chat(client);
        self.input_mode = InputMode::Normal;
        self.last_refresh = Instant::now();
    }

    fn open_login(&mut self, notice: Option<String>) {
        self.screen = Screen::Login(LoginForm::new(notice));
        self.input_mode = InputMode::Normal;
    }

    pub async fn handle_input(&mut self, event: Event) -> Result<()> {
        if let Event::Key(key) = event {
            if key.kind != KeyEventKind::Release {
                self.handle_key_event(key).await?;
            }
        }
        self.check_session_end();
        Ok(())
    }

    async fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Ok(());
        }

        if let Screen::Chat(client) = &mut self.screen {
            Self::handle_chat_key(client, &mut self.input_mode, &mut self.should_quit, key);
        } else {
            self.handle_login_key(key).await;
        }
        Ok(())
    }

    fn handle_chat_key(client: &mut ChatClient, mode: &mut InputMode, should_quit: &mut bool, key: KeyEvent) {
        // A pending alert swallows keys until dismissed.
        if client.alert().is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                client.dismiss_alert();
            }
            return;
        }

        match mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => *should_quit = true,
                KeyCode::Char('i') => *mode = InputMode::Editing,
                KeyCode::Char('s') => {
                    client.trigger_schedule();
                }
                KeyCode::Char('r') => client.reload_all(),
                KeyCode::Char('o') => client.logout(),
                KeyCode::Up => client.scroll_up(1),
                KeyCode::Down => client.scroll_down(1),
                KeyCode::PageUp => client.scroll_up(10),
                KeyCode::PageDown => client.scroll_down(10),
                KeyCode::End => client.display_messages(),
                _ => {}
            },
            InputMode::Editing => match key.code {
                KeyCode::Enter => {
                    client.submit();
                }
                KeyCode::Char(c) => client.input.insert(c),
                KeyCode::Backspace => client.input.backspace(),
                KeyCode::Delete => client.input.delete(),
                KeyCode::Left => client.input.left(),
                KeyCode::Right => client.input.right(),
                KeyCode::Home => client.input.home(),
                KeyCode::End => client.input.end(),
                KeyCode::Esc => *mode = InputMode::Normal,
                _ => {}
            },
        }
    }

    async fn handle_login_key(&mut self, key: KeyEvent) {
        let Screen::Login(form) = &mut self.screen else {
            return;
        };

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => form.toggle_mode(),
            KeyCode::Enter => {
                if let Some(session) = form.submit(self.api.as_ref(), &self.store).await {
                    self.open_chat(session);
                }
            }
            KeyCode::Char(c) => form.focused_mut().insert(c),
            KeyCode::Backspace => form.focused_mut().backspace(),
            KeyCode::Delete => form.focused_mut().delete(),
            KeyCode::Left => form.focused_mut().left(),
            KeyCode::Right => form.focused_mut().right(),
            KeyCode::Home => form.focused_mut().home(),
            KeyCode::End => form.focused_mut().end(),
            _ => {}
        }
    }

    pub fn on_tick(&mut self) {
        if let Screen::Chat(client) = &mut self.screen {
            client.poll_events();

            if self.last_refresh.elapsed() >= self.refresh_interval {
                client.refresh_messages();
                self.last_refresh = Instant::now();
            }
        }
        self.check_session_end();
    }

    /// Leave the chat screen once the client reports its session over.
    fn check_session_end(&mut self) {
        let Screen::Chat(client) = &mut self.screen else {
            return;
        };
        let Some(reason) = client.ended() else {
            return;
        };

        // An alert raised on the way out is shown on the login screen.
        let notice = client.take_alert();
        info!(?reason, "chat session ended");
        self.open_login(notice);
    }
}
