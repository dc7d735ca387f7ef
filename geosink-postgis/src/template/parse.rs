//! Lexing and parsing of statement templates.
//!
//! A template is literal text interleaved with `{{ ... }}` actions. An
//! action is a pipeline of commands separated by `|`; the value produced by
//! one stage is passed as the final argument of the next.

use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Errors raised while compiling a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// An action was opened but never closed.
    #[error("unclosed action starting at byte {0}")]
    UnclosedAction(usize),
    /// A comment was opened but never closed.
    #[error("unclosed comment starting at byte {0}")]
    UnclosedComment(usize),
    /// Something other than the closing delimiter followed a comment.
    #[error("comment ends before closing delimiter in action at byte {0}")]
    TextAfterComment(usize),
    /// An action or pipeline stage held no command.
    #[error("missing command in action at byte {0}")]
    EmptyAction(usize),
    /// A quoted string ran to the end of the line or template.
    #[error("unterminated quoted string at byte {0}")]
    UnterminatedString(usize),
    /// A character that cannot start a token.
    #[error("unexpected {found:?} in action at byte {offset}")]
    UnexpectedInput {
        /// Offending character.
        found: char,
        /// Byte offset in the template.
        offset: usize,
    },
    /// A token in a position where it has no meaning.
    #[error("unexpected {token} in action at byte {offset}")]
    UnexpectedToken {
        /// Offending token.
        token: String,
        /// Byte offset in the template.
        offset: usize,
    },
    /// A function name that is not defined.
    #[error("function {0:?} not defined")]
    UnknownFunction(String),
    /// A field chain that does not resolve against a feature.
    #[error("can't evaluate field {0}")]
    UnknownField(String),
    /// A function called with the wrong number of arguments.
    #[error("wrong number of args for {function}: want 1 got {found}")]
    Arity {
        /// Called function.
        function: &'static str,
        /// Arguments supplied, including a piped value.
        found: usize,
    },
    /// A later pipeline stage that is not a function call.
    #[error("non executable command in pipeline stage {0}")]
    NotExecutable(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Node {
    Text(String),
    Action(Vec<Command>),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Command {
    Operand(Operand),
    Call { function: Function, args: Vec<Operand> },
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Operand {
    Field(Field),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Field {
    Geometry,
    Srid,
    Tags(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Function {
    AsBinary,
    AsText,
    Quote,
}

impl Function {
    pub(super) const fn name(self) -> &'static str {
        match self {
            Self::AsBinary => "AsBinary",
            Self::AsText => "AsText",
            Self::Quote => "Quote",
        }
    }

    fn lookup(name: &str) -> Option<Self> {
        [Self::AsBinary, Self::AsText, Self::Quote]
            .into_iter()
            .find(|function| function.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Pipe,
    Field(Vec<String>),
    Ident(String),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

impl Token {
    fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Pipe => "\"|\"".to_owned(),
            TokenKind::Field(path) => format!("field .{}", path.join(".")),
            TokenKind::Ident(name) => format!("identifier {name:?}"),
            TokenKind::Str(value) => format!("string {value:?}"),
        }
    }
}

/// Character cursor tracking byte offsets into the source.
struct Cursor {
    chars: Vec<(usize, char)>,
    pos: usize,
    end: usize,
}

impl Cursor {
    fn new(source: &str) -> Self {
        Self {
            chars: source.char_indices().collect(),
            pos: 0,
            end: source.len(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.end, |&(offset, _)| offset)
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.peek();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn advance(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.chars.len());
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(ahead, c)| self.peek_at(ahead) == Some(c))
    }

    /// Skip ASCII whitespace, returning whether any was skipped.
    fn skip_space(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while let Some(c) = self.peek().filter(|&c| keep(c)) {
            taken.push(c);
            self.pos += 1;
        }
        taken
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// How an action was closed.
enum Close {
    Plain,
    Trim,
}

/// Parse `source` into a sequence of text and action nodes.
pub(super) fn parse(source: &str) -> Result<Vec<Node>, CompileError> {
    let mut cursor = Cursor::new(source);
    let mut nodes = Vec::new();
    let mut text = String::new();

    while cursor.peek().is_some() {
        if !cursor.starts_with(OPEN) {
            text.extend(cursor.bump());
            continue;
        }
        let start = cursor.offset();
        cursor.advance(OPEN.len());
        if cursor.peek() == Some('-') && cursor.peek_at(1).is_some_and(|c| c.is_ascii_whitespace())
        {
            cursor.advance(2);
            text.truncate(text.trim_end_matches(|c: char| c.is_ascii_whitespace()).len());
        }
        if !text.is_empty() {
            nodes.push(Node::Text(std::mem::take(&mut text)));
        }

        let close = if cursor.starts_with("/*") {
            comment(&mut cursor, start)?
        } else {
            let (tokens, close) = lex_action(&mut cursor, start)?;
            nodes.push(Node::Action(pipeline(tokens, start)?));
            close
        };
        if matches!(close, Close::Trim) {
            cursor.skip_space();
        }
    }
    if !text.is_empty() {
        nodes.push(Node::Text(text));
    }
    Ok(nodes)
}

fn close_delimiter(cursor: &mut Cursor, spaced: bool) -> Option<Close> {
    if spaced && cursor.starts_with("-}}") {
        cursor.advance(3);
        return Some(Close::Trim);
    }
    if cursor.starts_with(CLOSE) {
        cursor.advance(CLOSE.len());
        return Some(Close::Plain);
    }
    None
}

fn comment(cursor: &mut Cursor, start: usize) -> Result<Close, CompileError> {
    cursor.advance(2);
    while !cursor.starts_with("*/") {
        if cursor.bump().is_none() {
            return Err(CompileError::UnclosedComment(start));
        }
    }
    cursor.advance(2);
    if cursor.starts_with(CLOSE) {
        cursor.advance(CLOSE.len());
        return Ok(Close::Plain);
    }
    if cursor.peek().is_some_and(|c| c.is_ascii_whitespace()) && cursor.peek_at(1) == Some('-') {
        cursor.advance(2);
        if cursor.starts_with(CLOSE) {
            cursor.advance(CLOSE.len());
            return Ok(Close::Trim);
        }
    }
    Err(CompileError::TextAfterComment(start))
}

fn lex_action(cursor: &mut Cursor, start: usize) -> Result<(Vec<Token>, Close), CompileError> {
    let mut tokens = Vec::new();
    let mut spaced = true;
    loop {
        spaced |= cursor.skip_space();
        if let Some(close) = close_delimiter(cursor, spaced) {
            return Ok((tokens, close));
        }
        let offset = cursor.offset();
        let Some(next) = cursor.peek() else {
            return Err(CompileError::UnclosedAction(start));
        };
        let kind = match next {
            '|' => {
                cursor.advance(1);
                TokenKind::Pipe
            }
            '"' => TokenKind::Str(quoted(cursor)?),
            '`' => TokenKind::Str(raw(cursor)?),
            '.' => TokenKind::Field(field_path(cursor)),
            c if c.is_alphabetic() || c == '_' => TokenKind::Ident(cursor.take_while(is_ident_char)),
            found => return Err(CompileError::UnexpectedInput { found, offset }),
        };
        tokens.push(Token { kind, offset });
        spaced = false;
    }
}

fn field_path(cursor: &mut Cursor) -> Vec<String> {
    let mut path = Vec::new();
    while cursor.peek() == Some('.') {
        cursor.advance(1);
        let segment = cursor.take_while(is_ident_char);
        if segment.is_empty() {
            break;
        }
        path.push(segment);
    }
    path
}

fn quoted(cursor: &mut Cursor) -> Result<String, CompileError> {
    let start = cursor.offset();
    cursor.advance(1);
    let mut value = String::new();
    loop {
        match cursor.bump() {
            None | Some('\n') => return Err(CompileError::UnterminatedString(start)),
            Some('"') => return Ok(value),
            Some('\\') => {
                let escaped = match cursor.bump() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some(c @ ('\\' | '"' | '\'')) => c,
                    Some(found) => {
                        return Err(CompileError::UnexpectedInput {
                            found,
                            offset: cursor.offset(),
                        });
                    }
                    None => return Err(CompileError::UnterminatedString(start)),
                };
                value.push(escaped);
            }
            Some(c) => value.push(c),
        }
    }
}

fn raw(cursor: &mut Cursor) -> Result<String, CompileError> {
    let start = cursor.offset();
    cursor.advance(1);
    let value = cursor.take_while(|c| c != '`');
    if cursor.bump().is_none() {
        return Err(CompileError::UnterminatedString(start));
    }
    Ok(value)
}

fn pipeline(tokens: Vec<Token>, start: usize) -> Result<Vec<Command>, CompileError> {
    if tokens.is_empty() {
        return Err(CompileError::EmptyAction(start));
    }
    let mut stages: Vec<Vec<Token>> = vec![Vec::new()];
    for token in tokens {
        if token.kind == TokenKind::Pipe {
            stages.push(Vec::new());
        } else if let Some(stage) = stages.last_mut() {
            stage.push(token);
        }
    }
    stages
        .into_iter()
        .enumerate()
        .map(|(index, stage)| command(stage, index, start))
        .collect()
}

fn command(stage: Vec<Token>, index: usize, start: usize) -> Result<Command, CompileError> {
    let mut tokens = stage.into_iter();
    let head = tokens.next().ok_or(CompileError::EmptyAction(start))?;
    let piped = usize::from(index > 0);
    match head.kind {
        TokenKind::Ident(name) => {
            let function =
                Function::lookup(&name).ok_or(CompileError::UnknownFunction(name))?;
            let args = tokens.map(operand).collect::<Result<Vec<_>, _>>()?;
            let found = args.len() + piped;
            if found != 1 {
                return Err(CompileError::Arity {
                    function: function.name(),
                    found,
                });
            }
            Ok(Command::Call { function, args })
        }
        _ if index > 0 => Err(CompileError::NotExecutable(index + 1)),
        _ => {
            let value = operand(head)?;
            match tokens.next() {
                Some(extra) => Err(CompileError::UnexpectedToken {
                    token: extra.describe(),
                    offset: extra.offset,
                }),
                None => Ok(Command::Operand(value)),
            }
        }
    }
}

fn operand(token: Token) -> Result<Operand, CompileError> {
    match token.kind {
        TokenKind::Str(value) => Ok(Operand::Literal(value)),
        TokenKind::Field(path) => field(&path).map(Operand::Field),
        TokenKind::Pipe | TokenKind::Ident(_) => Err(CompileError::UnexpectedToken {
            token: token.describe(),
            offset: token.offset,
        }),
    }
}

fn field(path: &[String]) -> Result<Field, CompileError> {
    match path {
        [root] if root == "Geometry" => Ok(Field::Geometry),
        [root] if root == "SRID" => Ok(Field::Srid),
        [root, keys @ ..] if root == "Tags" => Ok(Field::Tags(keys.to_vec())),
        _ => Err(CompileError::UnknownField(format!(".{}", path.join(".")))),
    }
}
