/* Tokenize transition labels and convert them to reverse polish notation with the shunting-yard
 * algorithm (https://en.wikipedia.org/wiki/Shunting-yard_algorithm). Concatenation is never typed
 * by the user, it is inserted between adjacent operands and groups. */

use color_eyre::eyre::{Report, Result};
use std::fmt;

const GREEK_LETTER_NAMES: [&str; 24] = [
    "Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta", "Eta", "Theta", "Iota", "Kappa",
    "Lambda", "Mu", "Nu", "Xi", "Omicron", "Pi", "Rho", "Sigma", "Tau", "Upsilon", "Phi", "Chi",
    "Psi", "Omega",
];

const UPPER_GREEK_BASE: u32 = 913;
const LOWER_GREEK_BASE: u32 = 945;
const SUBSCRIPT_ZERO: u32 = 8320;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Operand(String),
    Or,
    Concat,
    Star,
    OpenParen,
    CloseParen,
}

impl Token {
    /// Binding strength of an operator. Star binds tightest, then concatenation, then union.
    pub fn precedence(&self) -> u8 {
        match self {
            Token::Star => 8,
            Token::Concat => 4,
            Token::Or => 2,
            _ => 0,
        }
    }

    fn is_binary(&self) -> bool {
        matches!(self, Token::Concat | Token::Or)
    }

    // Tokens that still wait for an operand on their right
    fn blocks_concat_on_left(&self) -> bool {
        matches!(
            self,
            Token::OpenParen | Token::Or | Token::Concat | Token::Star
        )
    }

    // Tokens that need an operand on their left
    fn blocks_concat_on_right(&self) -> bool {
        matches!(self, Token::CloseParen | Token::Or | Token::Concat)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Operand(operand) => write!(f, "{}", operand),
            Token::Or => write!(f, "+"),
            Token::Concat => write!(f, "&"),
            Token::Star => write!(f, "*"),
            Token::OpenParen => write!(f, "("),
            Token::CloseParen => write!(f, ")"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    UnbalancedParenthesis(String),
    OperatorStackUnderflow(String),
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprError::UnbalancedParenthesis(expr) => {
                write!(f, "Error: {} has unbalanced parenthesis!", expr)
            }
            ExprError::OperatorStackUnderflow(expr) => write!(
                f,
                "Error: the operator stack ran empty while parsing {}, fix the parentheses!",
                expr
            ),
        }
    }
}

impl std::error::Error for ExprError {}

/// Result of converting a label to RPN. Conversion never aborts: malformed input still produces a
/// best-effort token stream, and every problem found on the way is listed in `diagnostics`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rpn {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<ExprError>,
}

impl Rpn {
    pub fn is_well_formed(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// True when union is the outermost operation, i.e. the expression needs grouping before it
    /// can be concatenated with anything else.
    pub fn is_top_level_union(&self) -> bool {
        self.tokens.last() == Some(&Token::Or)
    }

    /// Strict view of the conversion: the first diagnostic becomes the error.
    pub fn into_result(self) -> Result<Vec<Token>> {
        match self.diagnostics.into_iter().next() {
            Some(err) => Err(Report::new(err)),
            None => Ok(self.tokens),
        }
    }
}

impl fmt::Display for Rpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self.tokens.iter().map(Token::to_string).collect();
        write!(f, "{}", tokens.join(" "))
    }
}

/// Replace the LaTeX greek letter shortcuts (`\alpha`, `\Omega`, ...) and subscript shortcuts
/// (`_0` .. `_9`) with their unicode characters.
pub fn convert_latex_shortcuts(text: &str) -> String {
    let mut text = text.to_string();

    for (i, name) in GREEK_LETTER_NAMES.iter().enumerate() {
        // The capital letter block has a hole where final sigma would be
        let offset = i as u32 + u32::from(i > 16);

        if let Some(upper) = char::from_u32(UPPER_GREEK_BASE + offset) {
            text = text.replace(&format!("\\{}", name), &upper.to_string());
        }
        if let Some(lower) = char::from_u32(LOWER_GREEK_BASE + offset) {
            text = text.replace(&format!("\\{}", name.to_lowercase()), &lower.to_string());
        }
    }

    for digit in 0..10 {
        if let Some(subscript) = char::from_u32(SUBSCRIPT_ZERO + digit) {
            text = text.replace(&format!("_{}", digit), &subscript.to_string());
        }
    }

    text
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

// Read a `\name` sequence starting at the backslash, returns it and the index after it
fn read_escape(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start + 1;
    while end < chars.len() && chars[end].is_ascii_alphabetic() {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

/// Rewrite `X*` into `(X)*` for every single operand `X` so that a star always follows a group.
fn wrap_single_stars(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len() + 8);
    let mut pos = 0;

    while pos < chars.len() {
        let (operand, next) = if chars[pos] == '\\' {
            read_escape(&chars, pos)
        } else if is_word_char(chars[pos]) {
            (chars[pos].to_string(), pos + 1)
        } else {
            result.push(chars[pos]);
            pos += 1;
            continue;
        };

        if chars.get(next) == Some(&'*') {
            result.push('(');
            result.push_str(&operand);
            result.push_str(")*");
            pos = next + 1;
        } else {
            result.push_str(&operand);
            pos = next;
        }
    }
    result
}

/// Find where the group that ends the token list begins, scanning backward and balancing
/// parentheses. For `[a, (, b, +, c, )]` this is index 1, for `[a, b]` it is index 1. Returns
/// None when the list is empty or the closing parentheses are never balanced.
pub fn find_group_start(tokens: &[Token]) -> Option<usize> {
    let mut depth: i64 = 0;

    for (locator, token) in tokens.iter().enumerate().rev() {
        match token {
            Token::CloseParen => depth += 1,
            Token::OpenParen => depth -= 1,
            _ => {}
        }

        if depth == 0 {
            return Some(locator);
        }
    }
    None
}

/// Insert explicit concatenation between two tokens unless the left one still waits for an
/// operand or the right one needs an operand on its left.
fn insert_concatenation(tokens: &mut Vec<Token>) {
    let mut i = tokens.len();

    while i > 1 {
        i -= 1;
        if !tokens[i - 1].blocks_concat_on_left() && !tokens[i].blocks_concat_on_right() {
            tokens.insert(i, Token::Concat);
        }
    }
}

/// Split a label into infix tokens. Stars are moved in front of the operand or group they apply
/// to and concatenation operators are made explicit.
pub fn parse_tokens(text: &str) -> (Vec<Token>, Vec<ExprError>) {
    let text = wrap_single_stars(&convert_latex_shortcuts(text));
    let chars: Vec<char> = text.chars().collect();

    let mut tokens: Vec<Token> = Vec::new();
    let mut diagnostics = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        match ch {
            '+' => tokens.push(Token::Or),
            '(' => tokens.push(Token::OpenParen),
            ')' => tokens.push(Token::CloseParen),
            '*' => match find_group_start(&tokens) {
                Some(start) => tokens.insert(start, Token::Star),
                None => {
                    diagnostics.push(ExprError::UnbalancedParenthesis(text.clone()));
                    tokens.insert(0, Token::Star);
                }
            },
            '\\' => {
                let (operand, next) = read_escape(&chars, pos);
                tokens.push(Token::Operand(operand));
                pos = next;
                continue;
            }
            ch if ch.is_whitespace() => {}
            ch => tokens.push(Token::Operand(ch.to_string())),
        }
        pos += 1;
    }

    insert_concatenation(&mut tokens);

    (tokens, diagnostics)
}

/// Convert a label to RPN. Malformed parenthesization is reported in the returned diagnostics
/// instead of aborting the conversion.
pub fn to_rpn(text: &str) -> Rpn {
    let (tokens, mut diagnostics) = parse_tokens(text);

    let mut output: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut op_stack: Vec<Token> = Vec::new();

    for token in tokens {
        match token {
            Token::Star | Token::OpenParen => op_stack.push(token),
            Token::Concat | Token::Or => {
                while let Some(top) = op_stack.last() {
                    if *top != Token::OpenParen && top.precedence() >= token.precedence() {
                        if let Some(next) = op_stack.pop() {
                            output.push(next);
                        }
                    } else {
                        break;
                    }
                }
                op_stack.push(token);
            }
            Token::CloseParen => {
                while let Some(top) = op_stack.pop() {
                    if top == Token::OpenParen {
                        op_stack.push(top);
                        break;
                    }
                    output.push(top);
                }

                if op_stack.pop().is_none() {
                    diagnostics.push(ExprError::OperatorStackUnderflow(text.to_string()));
                    continue;
                }

                // A star in front of the group applies to the whole group
                if op_stack.last() == Some(&Token::Star) {
                    if let Some(star) = op_stack.pop() {
                        output.push(star);
                    }
                }
            }
            operand => output.push(operand),
        }
    }

    while let Some(top) = op_stack.pop() {
        if top == Token::OpenParen {
            diagnostics.push(ExprError::UnbalancedParenthesis(text.to_string()));
            continue;
        }
        debug_assert!(top.is_binary() || top == Token::Star);
        output.push(top);
    }

    Rpn {
        tokens: output,
        diagnostics,
    }
}

/// How a string relates to a pair of parentheses around all of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuterParens {
    /// The string does not start with `(` and end with `)`.
    Absent,
    /// One pair wraps the whole string, e.g. `(a+b)`.
    Enclosing,
    /// First and last characters are parentheses of different groups, e.g. `(a)+(b)`.
    Separate,
    /// The interior never closes more than it opens but does not balance, e.g. `((a)`.
    Unbalanced,
}

/// Classify the outermost parentheses of `text` by counting the balance of its interior.
pub fn outer_parens(text: &str) -> OuterParens {
    if text.len() < 2 || !text.starts_with('(') || !text.ends_with(')') {
        return OuterParens::Absent;
    }

    let interior = &text[1..text.len() - 1];
    let mut score: i64 = 0;

    for ch in interior.chars() {
        match ch {
            '(' => score += 1,
            ')' => score -= 1,
            _ => {}
        }
        if score < 0 {
            return OuterParens::Separate;
        }
    }

    if score != 0 {
        OuterParens::Unbalanced
    } else {
        OuterParens::Enclosing
    }
}
