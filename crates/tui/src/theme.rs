use ratatui::style::Color;

pub struct Theme {
    pub border_focus: Color,
    pub border_inactive: Color,
    pub chat_border: Color,
    pub selected_fg: Color,
    pub selected_bg: Color,
    pub user: Color,
    pub bot: Color,
    pub error: Color,
    pub pending: Color,
    pub code: Color,
    pub key_missing: Color,
}

pub const THEME: Theme = Theme {
    border_focus: Color::Cyan,
    border_inactive: Color::DarkGray,
    chat_border: Color::DarkGray,
    selected_fg: Color::Black,
    selected_bg: Color::Cyan,
    user: Color::Green,
    bot: Color::Magenta,
    error: Color::Red,
    pending: Color::DarkGray,
    code: Color::Yellow,
    key_missing: Color::Red,
};
