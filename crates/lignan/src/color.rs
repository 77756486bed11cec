/*
  ____                 __               __                __
 / __ \__ _____ ____  / /___ ____ _    / /  ___  ___ ____/ /__ ____
/ /_/ / // / _ `/ _ \/ __/ // /  ' \  / /__/ _ \/ _ `/ _  / -_) __/
\___\_\_,_/\_,_/_//_/\__/\_,_/_/_/_/ /____/\___/\_,_/\_,_/\__/_/
    Part of the Quantum OS Project

Copyright 2025 Gavin Kellam

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or substantial
portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
*/

use core::fmt::{Display, Result, Write};

/// Raw ANSI sequences `logln!`/`warnln!`/`errorln!` splice around each line's gutter marker.
pub const RESET: &str = "\x1b[0m";
pub const LOG_STYLE: &str = "\x1b[2;36m";
pub const WARN_STYLE: &str = "\x1b[1;33m";
pub const ERR_STYLE: &str = "\x1b[1;31m";
pub const DIM_STYLE: &str = "\x1b[2m";

#[repr(u8)]
#[derive(Clone, Copy)]
pub enum AsciiForeground {
    None = u8::MAX,
    Black = 30,
    Red = 31,
    Green = 32,
    Yellow = 33,
    Blue = 34,
    Magenta = 35,
    Cyan = 36,
    White = 37,
    Default = 39,
    Reset = 0,
    BrightBlack = 90,
    BrightRed = 91,
    BrightGreen = 92,
    BrightYellow = 93,
    BrightBlue = 94,
    BrightMagenta = 95,
    BrightCyan = 96,
    BrightWhite = 97,
}

#[repr(u8)]
#[derive(Clone, Copy)]
pub enum AsciiBackground {
    None = u8::MAX,
    OnBlack = 40,
    OnRed = 41,
    OnGreen = 42,
    OnYellow = 43,
    OnBlue = 44,
    OnMagenta = 45,
    OnCyan = 46,
    OnWhite = 47,
    OnDefault = 49,
    OnBrightBlack = 100,
    OnBrightRed = 101,
    OnBrightGreen = 102,
    OnBrightYellow = 103,
    OnBrightBlue = 104,
    OnBrightMagenta = 105,
    OnBrightCyan = 106,
    OnBrightWhite = 107,
}

#[derive(Clone, Copy)]
pub enum AsciiMod {
    None,
    Bold,
    Dim,
    Italic,
    Underline,
    Blinking,
    Inverse,
    Hidden,
    Strikethrough,
}

pub struct Colorized<'a, T> {
    inner: &'a T,

    modify: AsciiMod,
    fore: AsciiForeground,
    back: AsciiBackground,
}

impl<'a, T> Colorized<'a, T> {
    pub fn new(inner: &'a T) -> Self {
        Self {
            inner,
            modify: AsciiMod::None,
            fore: AsciiForeground::None,
            back: AsciiBackground::None,
        }
    }

    pub fn mode(self, modify: AsciiMod) -> Self {
        Self { modify, ..self }
    }

    pub fn foreground(self, fore: AsciiForeground) -> Self {
        Self { fore, ..self }
    }

    pub fn background(self, back: AsciiBackground) -> Self {
        Self { back, ..self }
    }
}

impl<'a, T> Display for Colorized<'a, T>
where
    T: Display,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result {
        if let (AsciiMod::None, AsciiForeground::None, AsciiBackground::None) =
            (self.modify, self.fore, self.back)
        {
            return write!(f, "{}", self.inner);
        }

        f.write_char('[')?;
        match self.modify {
            AsciiMod::None => (),
            AsciiMod::Bold => f.write_str("1")?,
            AsciiMod::Dim => f.write_str("2")?,
            AsciiMod::Italic => f.write_str("3")?,
            AsciiMod::Underline => f.write_str("4")?,
            AsciiMod::Blinking => f.write_str("5")?,
            AsciiMod::Inverse => f.write_str("7")?,
            AsciiMod::Hidden => f.write_str("8")?,
            AsciiMod::Strikethrough => f.write_str("9")?,
        }

        match self.fore {
            AsciiForeground::None => (),
            m => {
                if !matches!(self.modify, AsciiMod::None) {
                    f.write_char(';')?;
                }

                write!(f, "{}", m as u8)?;
            }
        }

        match self.back {
            AsciiBackground::None => (),
            m => {
                if !matches!(self.fore, AsciiForeground::None) {
                    f.write_char(';')?;
                }

                write!(f, "{}", m as u8)?;
            }
        }

        f.write_char('m')?;
        self.inner.fmt(f)?;

        f.write_char('[')?;
        match self.modify {
            AsciiMod::None => f.write_str("0m"),
            AsciiMod::Bold => f.write_str("22;0m"),
            AsciiMod::Dim => f.write_str("22;0m"),
            AsciiMod::Italic => f.write_str("23;0m"),
            AsciiMod::Underline => f.write_str("24;0m"),
            AsciiMod::Blinking => f.write_str("25;0m"),
            AsciiMod::Inverse => f.write_str("27;0m"),
            AsciiMod::Hidden => f.write_str("28;0m"),
            AsciiMod::Strikethrough => f.write_str("29;0m"),
        }
    }
}
