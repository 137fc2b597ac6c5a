#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use time::OffsetDateTime;
use time::format_description::OwnedFormatItem;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::task::model::{Task, format_date, parse_date_format};
use crate::task::row::{self, RowController, RowOutcome, SwipeThresholds};
use crate::task::storage::{FileGateway, StorageError, StorageResult};
use crate::task::store::TaskStore;
use crate::tui;
use crate::tui::date_picker::{DatePicker, PickerOutcome};
use crate::tui::theme::{self, Palette, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    AddTask,
    PickDate,
    ConfirmDelete,
}

#[derive(Debug, Clone, Default)]
struct TextInput {
    text: String,
    cursor: usize,
}

impl TextInput {
    fn as_str(&self) -> &str {
        &self.text
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.text
            .char_indices()
            .nth(cursor)
            .map_or(self.text.len(), |(i, _)| i)
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.text.insert(at, c);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let at = self.byte_index(self.cursor);
            self.text.remove(at);
        }
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddTaskField {
    Title,
    Description,
    Date,
    Save,
}

impl AddTaskField {
    fn next(self) -> Self {
        match self {
            Self::Title => Self::Description,
            Self::Description => Self::Date,
            Self::Date => Self::Save,
            Self::Save => Self::Title,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Title => Self::Save,
            Self::Description => Self::Title,
            Self::Date => Self::Description,
            Self::Save => Self::Date,
        }
    }
}

#[derive(Debug, Clone)]
struct AddTaskDialog {
    title: TextInput,
    description: TextInput,
    date: OffsetDateTime,
    field: AddTaskField,
    error: Option<String>,
}

impl AddTaskDialog {
    fn new() -> Self {
        Self {
            title: TextInput::default(),
            description: TextInput::default(),
            date: OffsetDateTime::now_utc(),
            field: AddTaskField::Title,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
struct ConfirmDialog {
    task_id: String,
    task_title: String,
    yes_focused: bool,
}

#[derive(Debug, Clone)]
struct Toast {
    message: String,
    until: Instant,
}

impl Toast {
    fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            until: Instant::now() + Duration::from_secs(3),
        }
    }
}

#[derive(Debug)]
struct AppState {
    theme: Theme,
    date_format: OwnedFormatItem,
    thresholds: SwipeThresholds,
    swipe_step: i32,

    store: TaskStore,
    loading: Option<JoinHandle<StorageResult<Option<String>>>>,
    rows: HashMap<String, RowController>,
    list_state: ListState,

    add_task: Option<AddTaskDialog>,
    /// Form contents kept across a cancelled add, like a hidden sheet.
    draft: Option<AddTaskDialog>,
    date_picker: Option<DatePicker>,
    confirm: Option<ConfirmDialog>,

    toast: Option<Toast>,
    should_quit: bool,
}

impl AppState {
    fn new(
        cfg: &Config,
        store: TaskStore,
        loading: Option<JoinHandle<StorageResult<Option<String>>>>,
    ) -> anyhow::Result<Self> {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Ok(Self {
            theme: Theme::new(cfg.ui.dark_mode),
            date_format: parse_date_format(&cfg.ui.date_format)?,
            thresholds: cfg.swipe_thresholds(),
            swipe_step: i32::from(cfg.ui.swipe_step),
            store,
            loading,
            rows: HashMap::new(),
            list_state,
            add_task: None,
            draft: None,
            date_picker: None,
            confirm: None,
            toast: None,
            should_quit: false,
        })
    }

    fn mode(&self) -> Mode {
        if self.confirm.is_some() {
            Mode::ConfirmDelete
        } else if self.date_picker.is_some() {
            Mode::PickDate
        } else if self.add_task.is_some() {
            Mode::AddTask
        } else {
            Mode::Normal
        }
    }

    /// One controller per listed task; controllers of removed tasks go away.
    fn sync_rows(&mut self) {
        let thresholds = self.thresholds;
        let tasks = self.store.tasks();
        self.rows.retain(|id, _| tasks.iter().any(|t| &t.id == id));
        for t in tasks {
            self.rows
                .entry(t.id.clone())
                .or_insert_with(|| RowController::new(t.id.clone(), thresholds));
        }
    }

    fn selected_index(&self) -> usize {
        self.list_state.selected().unwrap_or(0)
    }

    fn selected_id(&self) -> Option<String> {
        self.store
            .tasks()
            .get(self.selected_index())
            .map(|t| t.id.clone())
    }

    fn clamp_selection(&mut self) {
        let len = self.store.len();
        let idx = self.selected_index().min(len.saturating_sub(1));
        self.list_state.select(Some(idx));
    }

    fn move_selection(&mut self, delta: i64) {
        if self.store.is_empty() {
            return;
        }
        release_selected(self);
        let cur = i64::try_from(self.selected_index()).unwrap_or(0);
        let max = i64::try_from(self.store.len().saturating_sub(1)).unwrap_or(0);
        let next = usize::try_from((cur + delta).clamp(0, max)).unwrap_or(0);
        self.list_state.select(Some(next));
    }
}

pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let gateway = Arc::new(FileGateway::new(cfg.data_dir()?));
    let mut store = TaskStore::new(gateway);
    let loading = store.start_loading();
    let mut app = AppState::new(&cfg, store, loading)?;

    let terminal = tui::init_terminal()?;
    let mut guard = TerminalGuard::new(terminal);

    loop {
        if let Some(toast) = &app.toast
            && Instant::now() >= toast.until
        {
            app.toast = None;
        }

        if app.loading.as_ref().is_some_and(JoinHandle::is_finished)
            && let Some(handle) = app.loading.take()
        {
            let loaded = match handle.await {
                Ok(res) => res,
                Err(e) => Err(StorageError::Unavailable(format!("load task failed: {e}"))),
            };
            app.store.finish_loading(loaded);
            app.clamp_selection();
        }
        app.sync_rows();

        {
            let Some(terminal) = guard.terminal.as_mut() else {
                anyhow::bail!("terminal unavailable");
            };
            terminal.draw(|f| draw(f, &mut app))?;
        }

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            handle_key(key, &mut app);
        }
    }

    app.store.flush().await;
    drop(guard);
    Ok(())
}

fn draw(f: &mut Frame<'_>, app: &mut AppState) {
    let palette = app.theme.palette();
    let area = f.area();
    f.render_widget(
        Block::default().style(Style::default().bg(palette.background).fg(palette.text)),
        area,
    );

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, root[0], app.theme);
    draw_tasks(f, root[1], app, palette);
    draw_footer(f, root[2], app, palette);

    if let Some(dialog) = &app.add_task {
        draw_add_task_popup(f, dialog, &app.date_format, palette);
    }
    if let Some(picker) = &app.date_picker {
        draw_date_picker(f, picker, &app.date_format, palette);
    }
    if let Some(confirm) = &app.confirm {
        draw_confirm(f, confirm, palette);
    }
}

fn draw_header(f: &mut Frame<'_>, area: Rect, theme: Theme) {
    let palette = theme.palette();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(16)])
        .split(area);

    let title = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            " My Tasks",
            Style::default()
                .fg(palette.text)
                .add_modifier(Modifier::BOLD),
        )),
    ]);
    f.render_widget(title, chunks[0]);

    let toggle = Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("[t] ", Style::default().fg(palette.text_secondary)),
            Span::styled(
                theme.toggle_label(),
                Style::default()
                    .fg(palette.primary)
                    .bg(palette.surface)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
    ])
    .alignment(Alignment::Right);
    f.render_widget(toggle, chunks[1]);
}

fn draw_tasks(f: &mut Frame<'_>, area: Rect, app: &mut AppState, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .title(format!(" Tasks ({}) ", app.store.len()));

    if !app.store.is_hydrated() || app.store.is_empty() {
        let msg = if app.store.is_hydrated() {
            "No tasks yet. Press 'a' to add one."
        } else {
            "Loading…"
        };
        let para = Paragraph::new(Line::from(Span::styled(
            msg,
            Style::default().fg(palette.text_secondary),
        )))
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(para, area);
        return;
    }

    // Highlight symbol takes two columns.
    let width = usize::from(block.inner(area).width.saturating_sub(2));
    let items: Vec<ListItem<'static>> = app
        .store
        .tasks()
        .iter()
        .map(|task| {
            let offset = app.rows.get(&task.id).map_or(0, RowController::offset);
            task_item(task, offset, width, &app.date_format, palette)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(palette.surface))
        .highlight_symbol("▌ ");
    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn task_item(
    task: &Task,
    offset: i32,
    width: usize,
    date_format: &OwnedFormatItem,
    palette: &Palette,
) -> ListItem<'static> {
    let done = if task.is_completed {
        Modifier::CROSSED_OUT | Modifier::DIM
    } else {
        Modifier::empty()
    };

    let mut lines = vec![Line::from(Span::styled(
        task.title.clone(),
        Style::default()
            .fg(palette.text)
            .add_modifier(Modifier::BOLD | done),
    ))];
    if !task.description.is_empty() {
        lines.push(Line::from(Span::styled(
            task.description.clone(),
            Style::default().fg(palette.text_secondary).add_modifier(done),
        )));
    }
    lines.push(Line::from(Span::styled(
        format_date(task.date, date_format),
        Style::default()
            .fg(palette.primary)
            .add_modifier(Modifier::BOLD),
    )));

    let reveal = usize::try_from(offset.unsigned_abs()).unwrap_or(0);
    if reveal > 0 {
        let (label, color) = if offset > 0 {
            let color = if task.is_completed {
                theme::UNDO_ACTION
            } else {
                theme::COMPLETE_ACTION
            };
            (row::left_action_label(task), color)
        } else {
            (row::DELETE_LABEL, theme::DELETE_ACTION)
        };
        let strip = Style::default()
            .bg(color)
            .fg(theme::ACTION_TEXT)
            .add_modifier(Modifier::BOLD);

        for (i, line) in lines.iter_mut().enumerate() {
            let text = if i == 0 {
                fit_label(label, reveal)
            } else {
                " ".repeat(reveal)
            };
            if offset > 0 {
                line.spans.insert(0, Span::raw(" "));
                line.spans.insert(0, Span::styled(text, strip));
            } else {
                let pad = width.saturating_sub(reveal + line.width());
                line.spans.push(Span::raw(" ".repeat(pad)));
                line.spans.push(Span::styled(text, strip));
            }
        }
    }

    lines.push(Line::from(""));
    ListItem::new(lines)
}

/// Centers `label` in `width` columns, cutting it when the strip is narrower.
fn fit_label(label: &str, width: usize) -> String {
    let len = label.chars().count();
    if width <= len {
        return label.chars().take(width).collect();
    }
    let left = (width - len) / 2;
    format!(
        "{}{label}{}",
        " ".repeat(left),
        " ".repeat(width - len - left)
    )
}

fn draw_footer(f: &mut Frame<'_>, area: Rect, app: &AppState, palette: &Palette) {
    let hint_style = Style::default().fg(palette.text_secondary);

    if let Some(toast) = &app.toast {
        let line = Line::from(Span::styled(
            format!(" {}", toast.message),
            Style::default()
                .fg(palette.primary)
                .add_modifier(Modifier::BOLD),
        ));
        f.render_widget(Paragraph::new(line), area);
        return;
    }

    let hint = match app.mode() {
        Mode::ConfirmDelete => " y yes • n no • ←/→ choose • Enter confirm choice",
        Mode::PickDate => " ←/→ day • ↑/↓ week • PgUp/PgDn month • Enter pick • Esc back",
        Mode::AddTask => " Tab next field • Ctrl+S save • Esc cancel",
        Mode::Normal if !app.store.is_hydrated() => " loading tasks… • q quit",
        Mode::Normal => {
            " a add • → done/undo • ← delete • space close • j/k move • t theme • q quit"
        }
    };
    f.render_widget(Paragraph::new(Line::from(Span::styled(hint, hint_style))), area);
}

fn draw_add_task_popup(
    f: &mut Frame<'_>,
    dialog: &AddTaskDialog,
    date_format: &OwnedFormatItem,
    palette: &Palette,
) {
    let area = centered_rect(70, 50, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .style(Style::default().bg(palette.surface).fg(palette.text))
        .title(" Add New Task ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let label = Style::default().add_modifier(Modifier::BOLD);
    let active = Style::default()
        .fg(palette.primary)
        .add_modifier(Modifier::BOLD);
    let placeholder = Style::default().fg(palette.text_secondary);
    let style_for = |field: AddTaskField| {
        if dialog.field == field {
            active
        } else {
            Style::default()
        }
    };

    let title = if dialog.title.as_str().is_empty() && dialog.field != AddTaskField::Title {
        Span::styled("Task Title", placeholder)
    } else {
        Span::styled(dialog.title.as_str(), style_for(AddTaskField::Title))
    };
    let description =
        if dialog.description.as_str().is_empty() && dialog.field != AddTaskField::Description {
            Span::styled("Optional", placeholder)
        } else {
            Span::styled(
                dialog.description.as_str(),
                style_for(AddTaskField::Description),
            )
        };

    let save_style = if dialog.field == AddTaskField::Save {
        Style::default()
            .bg(palette.primary)
            .fg(theme::ACTION_TEXT)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.primary)
    };

    let mut lines = vec![
        Line::from(vec![Span::styled("Title:       ", label), title]),
        Line::from(vec![Span::styled("Description: ", label), description]),
        Line::from(vec![
            Span::styled("Date:        ", label),
            Span::styled(
                format_date(dialog.date, date_format),
                style_for(AddTaskField::Date),
            ),
            Span::styled("  (Enter to pick)", placeholder),
        ]),
        Line::from(""),
        Line::from(Span::styled(" Save Task ", save_style)),
    ];

    if let Some(err) = dialog.error.as_deref() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            err.to_owned(),
            Style::default().fg(palette.error),
        )));
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);

    let cursor = match dialog.field {
        AddTaskField::Title => Some((0u16, &dialog.title)),
        AddTaskField::Description => Some((1u16, &dialog.description)),
        AddTaskField::Date | AddTaskField::Save => None,
    };
    if let Some((line_idx, input)) = cursor {
        let x = inner.x
            + u16::try_from("Description: ".chars().count()).unwrap_or(0)
            + cursor_x_for_text(input.as_str(), input.cursor);
        f.set_cursor_position((x, inner.y + line_idx));
    }
}

fn draw_date_picker(
    f: &mut Frame<'_>,
    picker: &DatePicker,
    date_format: &OwnedFormatItem,
    palette: &Palette,
) {
    let area = centered_rect(40, 25, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.primary))
        .style(Style::default().bg(palette.surface).fg(palette.text))
        .title(" Pick a date ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format_date(picker.current(), date_format),
            Style::default()
                .fg(palette.primary)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Enter confirm • Esc cancel",
            Style::default().fg(palette.text_secondary),
        )),
    ];
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        inner,
    );
}

fn draw_confirm(f: &mut Frame<'_>, confirm: &ConfirmDialog, palette: &Palette) {
    let area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::DELETE_ACTION))
        .style(Style::default().bg(palette.surface).fg(palette.text))
        .title(format!(" {} ", row::CONFIRM_TITLE));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let focused = Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED);
    let (no_style, yes_style) = if confirm.yes_focused {
        (
            Style::default(),
            focused.fg(theme::DELETE_ACTION),
        )
    } else {
        (focused, Style::default().fg(theme::DELETE_ACTION))
    };

    let lines = vec![
        Line::from(row::CONFIRM_MESSAGE),
        Line::from(Span::styled(
            format!("\"{}\"", confirm.task_title),
            Style::default().fg(palette.text_secondary),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(format!(" [n] {} ", row::CONFIRM_NO), no_style),
            Span::raw("    "),
            Span::styled(format!(" [y] {} ", row::CONFIRM_YES), yes_style),
        ]),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn handle_key(key: KeyEvent, app: &mut AppState) {
    // The delete confirmation only answers to No/Yes, Ctrl+C included.
    if app.mode() == Mode::ConfirmDelete {
        handle_confirm_key(key, app);
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
        app.should_quit = true;
        return;
    }

    match app.mode() {
        Mode::ConfirmDelete => {}
        Mode::PickDate => {
            handle_date_picker_key(key, app);
            return;
        }
        Mode::AddTask => {
            handle_add_task_key(key, app);
            return;
        }
        Mode::Normal => {}
    }

    let step = app.swipe_step;
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => app.move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_selection(-1),
        KeyCode::Char('l') | KeyCode::Right => drag_selected(app, step),
        KeyCode::Char('h') | KeyCode::Left => drag_selected(app, -step),
        KeyCode::Char(' ') | KeyCode::Enter => {
            release_selected(app);
        }
        KeyCode::Char('a' | '+') => {
            app.add_task = Some(app.draft.take().unwrap_or_else(AddTaskDialog::new));
        }
        KeyCode::Char('t') => app.theme = app.theme.toggled(),
        _ => {}
    }
}

fn drag_selected(app: &mut AppState, dx: i32) {
    if !app.store.is_hydrated() {
        return;
    }
    let Some(id) = app.selected_id() else {
        return;
    };
    let Some(row) = app.rows.get_mut(&id) else {
        return;
    };
    match row.drag(dx, &mut app.store) {
        RowOutcome::Toggled { completed } => {
            let msg = if completed {
                "Marked as done"
            } else {
                "Marked as not done"
            };
            app.toast = Some(Toast::info(msg));
        }
        RowOutcome::ConfirmDelete => {
            let task_title = app
                .store
                .get(&id)
                .map(|t| t.title.clone())
                .unwrap_or_default();
            app.confirm = Some(ConfirmDialog {
                task_id: id,
                task_title,
                yes_focused: false,
            });
        }
        _ => {}
    }
}

fn release_selected(app: &mut AppState) -> RowOutcome {
    let Some(id) = app.selected_id() else {
        return RowOutcome::Unchanged;
    };
    app.rows
        .get_mut(&id)
        .map_or(RowOutcome::Unchanged, RowController::release)
}

fn handle_confirm_key(key: KeyEvent, app: &mut AppState) {
    let choice = match key.code {
        KeyCode::Char('y' | 'Y') => Some(true),
        KeyCode::Char('n' | 'N') => Some(false),
        KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
            if let Some(confirm) = app.confirm.as_mut() {
                confirm.yes_focused = !confirm.yes_focused;
            }
            None
        }
        KeyCode::Enter => app.confirm.as_ref().map(|c| c.yes_focused),
        _ => None,
    };
    let Some(accepted) = choice else {
        return;
    };
    let Some(confirm) = app.confirm.take() else {
        return;
    };

    let outcome = match app.rows.get_mut(&confirm.task_id) {
        Some(row) => row.resolve_confirmation(accepted, &mut app.store),
        None => RowOutcome::Closed,
    };
    if outcome == RowOutcome::Deleted {
        app.rows.remove(&confirm.task_id);
        app.clamp_selection();
        app.toast = Some(Toast::info(format!("Deleted \"{}\"", confirm.task_title)));
    }
}

fn handle_date_picker_key(key: KeyEvent, app: &mut AppState) {
    let Some(picker) = app.date_picker.as_mut() else {
        return;
    };
    match picker.handle_key(key) {
        PickerOutcome::Pending => {}
        PickerOutcome::Confirmed(date) => {
            if let Some(dialog) = app.add_task.as_mut() {
                dialog.date = date;
            }
            app.date_picker = None;
        }
        PickerOutcome::Cancelled => app.date_picker = None,
    }
}

fn handle_add_task_key(key: KeyEvent, app: &mut AppState) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('s')) {
        submit_add_task(app);
        return;
    }
    let Some(dialog) = app.add_task.as_mut() else {
        return;
    };
    let field = dialog.field;

    match key.code {
        KeyCode::Esc => app.draft = app.add_task.take(),
        KeyCode::Tab => {
            dialog.error = None;
            dialog.field = field.next();
        }
        KeyCode::BackTab => {
            dialog.error = None;
            dialog.field = field.prev();
        }
        KeyCode::Enter => match field {
            AddTaskField::Title | AddTaskField::Description => dialog.field = field.next(),
            AddTaskField::Date => app.date_picker = Some(DatePicker::new(dialog.date)),
            AddTaskField::Save => submit_add_task(app),
        },
        _ => {
            dialog.error = None;
            match field {
                AddTaskField::Title => handle_text_input_key(key, &mut dialog.title),
                AddTaskField::Description => handle_text_input_key(key, &mut dialog.description),
                AddTaskField::Date if key.code == KeyCode::Char(' ') => {
                    app.date_picker = Some(DatePicker::new(dialog.date));
                }
                AddTaskField::Date | AddTaskField::Save => {}
            }
        }
    }
}

fn submit_add_task(app: &mut AppState) {
    let Some(dialog) = app.add_task.as_mut() else {
        return;
    };
    if dialog.title.as_str().trim().is_empty() {
        dialog.error = Some("Please enter a task title".to_owned());
        dialog.field = AddTaskField::Title;
        return;
    }
    let title = dialog.title.as_str().to_owned();
    let description = dialog.description.as_str().to_owned();
    let date = dialog.date;

    if app.store.add_task(&title, &description, date).is_some() {
        app.add_task = None;
        app.draft = None;
        app.list_state.select(Some(app.store.len().saturating_sub(1)));
        app.toast = Some(Toast::info(format!("Added \"{title}\"")));
    } else if let Some(dialog) = app.add_task.as_mut() {
        dialog.error = Some("Tasks are still loading, try again".to_owned());
    }
}

fn handle_text_input_key(key: KeyEvent, input: &mut TextInput) {
    match key.code {
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        KeyCode::Home => input.move_home(),
        KeyCode::End => input.move_end(),
        KeyCode::Char(c) => {
            if !key.modifiers.contains(KeyModifiers::CONTROL)
                && !key.modifiers.contains(KeyModifiers::ALT)
            {
                input.insert_char(c);
            }
        }
        _ => {}
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn cursor_x_for_text(text: &str, cursor: usize) -> u16 {
    u16::try_from(text.chars().take(cursor).count()).unwrap_or(0)
}

struct TerminalGuard {
    terminal: Option<tui::Terminal>,
}

impl TerminalGuard {
    fn new(terminal: tui::Terminal) -> Self {
        Self {
            terminal: Some(terminal),
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Some(terminal) = self.terminal.take() {
            let _ = tui::restore_terminal(terminal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::storage::MemoryGateway;
    use time::macros::datetime;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut AppState, codes: &[KeyCode]) {
        for code in codes {
            handle_key(key(*code), app);
            app.sync_rows();
        }
    }

    async fn app_with(titles: &[&str]) -> (AppState, MemoryGateway) {
        let gw = MemoryGateway::new();
        let mut store = TaskStore::new(Arc::new(gw.clone()));
        store.initialize().await;
        for title in titles {
            store.add_task(title, "", datetime!(2024-01-01 0:00 UTC));
        }
        let mut app = AppState::new(&Config::default(), store, None).expect("app");
        app.sync_rows();
        (app, gw)
    }

    #[tokio::test]
    async fn delete_confirmation_needs_an_explicit_answer() {
        let (mut app, _gw) = app_with(&["Keep", "Other"]).await;

        press(&mut app, &[KeyCode::Left; 4]);
        assert_eq!(app.mode(), Mode::ConfirmDelete);

        press(&mut app, &[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('a')]);
        handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut app);
        assert_eq!(app.mode(), Mode::ConfirmDelete);
        assert!(!app.should_quit);

        press(&mut app, &[KeyCode::Char('n')]);
        assert_eq!(app.mode(), Mode::Normal);
        assert_eq!(app.store.len(), 2);
        let id = app.selected_id().unwrap();
        assert_eq!(app.rows[&id].offset(), 0);

        press(&mut app, &[KeyCode::Left; 4]);
        press(&mut app, &[KeyCode::Char('y')]);
        assert_eq!(app.store.len(), 1);
        assert_eq!(app.store.tasks()[0].title, "Other");
        assert_eq!(app.rows.len(), 1);
    }

    #[tokio::test]
    async fn right_swipe_toggles_and_moving_releases_open_rows() {
        let (mut app, _gw) = app_with(&["A", "B"]).await;

        press(&mut app, &[KeyCode::Right; 4]);
        assert!(app.store.tasks()[0].is_completed);

        press(&mut app, &[KeyCode::Right, KeyCode::Down]);
        let first = app.store.tasks()[0].id.clone();
        assert_eq!(app.rows[&first].offset(), 0);
        assert_eq!(app.selected_index(), 1);
    }

    #[tokio::test]
    async fn add_dialog_requires_a_title_and_resets_after_save() {
        let (mut app, gw) = app_with(&[]).await;

        press(&mut app, &[KeyCode::Char('a'), KeyCode::Char(' ')]);
        handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL), &mut app);
        assert_eq!(app.mode(), Mode::AddTask);
        assert!(app.add_task.as_ref().unwrap().error.is_some());

        press(
            &mut app,
            &[
                KeyCode::Backspace,
                KeyCode::Char('M'),
                KeyCode::Char('i'),
                KeyCode::Char('l'),
                KeyCode::Char('k'),
            ],
        );
        handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL), &mut app);
        assert_eq!(app.mode(), Mode::Normal);
        assert_eq!(app.store.tasks()[0].title, "Milk");

        press(&mut app, &[KeyCode::Char('a')]);
        assert!(app.add_task.as_ref().unwrap().title.as_str().is_empty());

        app.store.flush().await;
        assert_eq!(gw.save_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_add_keeps_the_draft() {
        let (mut app, _gw) = app_with(&[]).await;

        press(&mut app, &[KeyCode::Char('a'), KeyCode::Char('x'), KeyCode::Esc]);
        assert_eq!(app.mode(), Mode::Normal);
        press(&mut app, &[KeyCode::Char('a')]);
        assert_eq!(app.add_task.as_ref().unwrap().title.as_str(), "x");
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn date_picker_updates_the_form_only_on_confirm() {
        let (mut app, _gw) = app_with(&[]).await;
        press(&mut app, &[KeyCode::Char('a')]);
        let before = app.add_task.as_ref().unwrap().date;

        press(&mut app, &[KeyCode::Tab, KeyCode::Tab, KeyCode::Enter]);
        assert_eq!(app.mode(), Mode::PickDate);
        press(&mut app, &[KeyCode::Right, KeyCode::Esc]);
        assert_eq!(app.add_task.as_ref().unwrap().date, before);

        press(&mut app, &[KeyCode::Enter, KeyCode::Right, KeyCode::Enter]);
        assert_eq!(app.mode(), Mode::AddTask);
        assert_eq!(
            app.add_task.as_ref().unwrap().date,
            before + time::Duration::days(1)
        );
    }

    #[tokio::test]
    async fn theme_toggle_flips_only_the_theme() {
        let (mut app, gw) = app_with(&["A"]).await;
        press(&mut app, &[KeyCode::Char('t')]);
        assert!(app.theme.is_dark());
        press(&mut app, &[KeyCode::Char('t')]);
        assert!(!app.theme.is_dark());
        app.store.flush().await;
        assert_eq!(gw.save_count(), 1);
    }

    #[test]
    fn labels_fit_the_revealed_strip() {
        assert_eq!(fit_label("Done", 8), "  Done  ");
        assert_eq!(fit_label("Delete", 3), "Del");
        assert_eq!(fit_label("Undo", 0), "");
    }

    #[test]
    fn text_input_edits_multibyte_text() {
        let mut input = TextInput::default();
        for c in "héllo".chars() {
            input.insert_char(c);
        }
        input.move_left();
        input.backspace();
        input.move_home();
        input.delete();
        assert_eq!(input.as_str(), "élo");
        input.move_end();
        input.move_right();
        assert_eq!(input.cursor, 3);
    }
}
