//! Action script parser.
//!
//! A non-interactive replay is driven by a small list of actions pinned to
//! bar indices:
//!
//! ```text
//! buy 100 @ 12 stop 95 target 110
//! sell 50 @ 20 stop 52
//! flatten @ 40
//! ```
//!
//! Recursive descent with character positions in errors.

use crate::domain::error::ParseError;
use crate::domain::trade::TradeSide;

/// What to do when the cursor reaches the action's bar.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOp {
    Place {
        side: TradeSide,
        quantity: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    },
    Flatten,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedAction {
    pub bar: usize,
    pub op: ActionOp,
}

/// Parse one action line.
pub fn parse(input: &str) -> Result<ScriptedAction, ParseError> {
    let mut parser = Parser::new(input);
    let action = parser.parse_action()?;
    parser.expect_end()?;
    Ok(action)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .map(|c| c.is_alphanumeric() || c == '_')
                .unwrap_or(false)
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '.' {
                if ch.is_ascii_digit() {
                    digits += 1;
                }
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: format!("expected a number, found '{}'", self.peek_word()),
                position: start,
            });
        }

        self.input[start..self.pos]
            .parse::<f64>()
            .map_err(|_| ParseError {
                message: format!("invalid number '{}'", &self.input[start..self.pos]),
                position: start,
            })
    }

    fn parse_bar_index(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(ParseError {
                message: format!("expected a bar index, found '{}'", self.peek_word()),
                position: start,
            });
        }
        self.input[start..self.pos]
            .parse::<usize>()
            .map_err(|_| ParseError {
                message: format!("invalid bar index '{}'", &self.input[start..self.pos]),
                position: start,
            })
    }

    fn parse_action(&mut self) -> Result<ScriptedAction, ParseError> {
        self.skip_whitespace();
        if self.consume_keyword("flatten") {
            self.expect_char('@')?;
            let bar = self.parse_bar_index()?;
            return Ok(ScriptedAction {
                bar,
                op: ActionOp::Flatten,
            });
        }

        let side = if self.consume_keyword("buy") {
            TradeSide::Buy
        } else if self.consume_keyword("sell") {
            TradeSide::Sell
        } else {
            return Err(ParseError {
                message: format!(
                    "expected 'buy', 'sell' or 'flatten', found '{}'",
                    self.peek_word()
                ),
                position: self.pos,
            });
        };

        let quantity = self.parse_number()?;
        self.expect_char('@')?;
        let bar = self.parse_bar_index()?;

        let mut stop_loss = None;
        let mut take_profit = None;
        loop {
            if stop_loss.is_none() && self.consume_keyword("stop") {
                stop_loss = Some(self.parse_number()?);
            } else if take_profit.is_none() && self.consume_keyword("target") {
                take_profit = Some(self.parse_number()?);
            } else {
                break;
            }
        }

        Ok(ScriptedAction {
            bar,
            op: ActionOp::Place {
                side,
                quantity,
                stop_loss,
                take_profit,
            },
        })
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected trailing input '{}'", self.peek_word()),
                position: self.pos,
            });
        }
        Ok(())
    }
}
