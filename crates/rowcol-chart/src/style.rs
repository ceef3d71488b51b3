use std::str::FromStr;

use serde::Serialize;

/// Glyph set. Every style paints the same cells; only the characters differ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    #[default]
    Ascii,
    Unicode,
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" => Ok(Style::Ascii),
            "unicode" | "utf8" | "utf-8" => Ok(Style::Unicode),
            other => Err(format!("unknown chart style `{other}`")),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Glyphs {
    pub blank: char,
    pub bar: char,
    pub point: char,
    pub points: char,
    pub cap: char,
    pub whisker: char,
    pub box_horizontal: char,
    pub box_vertical: char,
    pub top_left: char,
    pub top_right: char,
    pub bottom_left: char,
    pub bottom_right: char,
    pub median: char,
}

const ASCII: Glyphs = Glyphs {
    blank: ' ',
    bar: '#',
    point: '*',
    points: '@',
    cap: '-',
    whisker: '|',
    box_horizontal: '-',
    box_vertical: '|',
    top_left: '+',
    top_right: '+',
    bottom_left: '+',
    bottom_right: '+',
    median: '=',
};

const UNICODE: Glyphs = Glyphs {
    blank: ' ',
    bar: '█',
    point: '•',
    points: '◉',
    cap: '─',
    whisker: '│',
    box_horizontal: '─',
    box_vertical: '│',
    top_left: '┌',
    top_right: '┐',
    bottom_left: '└',
    bottom_right: '┘',
    median: '━',
};

impl Style {
    pub(crate) fn glyphs(self) -> &'static Glyphs {
        match self {
            Style::Ascii => &ASCII,
            Style::Unicode => &UNICODE,
        }
    }
}
