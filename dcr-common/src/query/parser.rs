// Query parser - converts boolean filter expressions into an AST
// Supports: numbers, string literals, true/false/null, bare column identifiers,
// function calls, arithmetic (+ - * / %), comparisons (== != === !== < <= > >=),
// logical operators (&& || !) and their keyword forms (and, or, not)

/// Expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    Null,
    /// Column reference, resolved per record at evaluation time
    Ident(String),
    Not(Box<Expr>),
    Negate(Box<Expr>),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Function name is stored normalized (lower case, no underscores)
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Number of levels in the tree; walks with an explicit stack
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack = vec![(self, 1)];
        while let Some((expr, level)) = stack.pop() {
            height = height.max(level);
            match expr {
                Expr::Not(inner) | Expr::Negate(inner) => stack.push((&**inner, level + 1)),
                Expr::BinaryOp { left, right, .. } => {
                    stack.push((&**left, level + 1));
                    stack.push((&**right, level + 1));
                }
                Expr::Function { args, .. } => {
                    stack.extend(args.iter().map(|arg| (arg, level + 1)));
                }
                _ => {}
            }
        }
        height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    // Logical (short-circuit)
    Or,
    And,
    // Equality
    Eq,          // ==
    NotEq,       // !=
    StrictEq,    // ===
    StrictNotEq, // !==
    // Relational
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Parse an expression string into an AST
pub fn parse(expression: &str) -> Result<Expr, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("Empty expression".to_string());
    }
    let (expr, pos) = parse_or(&tokens, 0, 0)?;
    if pos < tokens.len() {
        return Err(format!(
            "Unexpected {} at position {}",
            describe(&tokens[pos]),
            pos
        ));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    StringLit(String),
    Ident(String),
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    BangEq,
    EqEqEq,
    BangEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::StringLit(s) => format!("string \"{}\"", s),
        Token::Ident(name) => format!("identifier {}", name),
        Token::True => "true".to_string(),
        Token::False => "false".to_string(),
        Token::Null => "null".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Percent => "'%'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Bang => "'!'".to_string(),
        Token::AndAnd => "'&&'".to_string(),
        Token::OrOr => "'||'".to_string(),
        Token::EqEq => "'=='".to_string(),
        Token::BangEq => "'!='".to_string(),
        Token::EqEqEq => "'==='".to_string(),
        Token::BangEqEq => "'!=='".to_string(),
        Token::Lt => "'<'".to_string(),
        Token::LtEq => "'<='".to_string(),
        Token::Gt => "'>'".to_string(),
        Token::GtEq => "'>='".to_string(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '%' => { tokens.push(Token::Percent); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            ',' => { tokens.push(Token::Comma); chars.next(); }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    if chars.peek() == Some(&'=') {
                        chars.next();
                        tokens.push(Token::BangEqEq);
                    } else {
                        tokens.push(Token::BangEq);
                    }
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '=' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err("Unexpected '=' (use == to compare)".to_string());
                }
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEqEq);
                } else {
                    tokens.push(Token::EqEq);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::LtEq);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::GtEq);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err("Unexpected '&' (use && for logical and)".to_string());
                }
                tokens.push(Token::AndAnd);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err("Unexpected '|' (use || for logical or)".to_string());
                }
                tokens.push(Token::OrOr);
            }
            '"' | '\'' => {
                // String literal, either quote style, backslash escapes
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some('\\') => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(other) => s.push(other),
                            None => return Err("Unterminated string literal".to_string()),
                        },
                        Some(ch) => s.push(ch),
                        None => return Err("Unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            'A'..='Z' | 'a'..='z' | '_' => {
                // Dots are allowed after the first character so columns such
                // as `image.source` can be referenced directly
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" | "undefined" => Token::Null,
                    "and" => Token::AndAnd,
                    "or" => Token::OrOr,
                    "not" => Token::Bang,
                    _ => Token::Ident(ident),
                });
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Optional exponent: e10, E-3, e+2
                if let Some(&e) = chars.peek() {
                    if e == 'e' || e == 'E' {
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        let mut exponent = String::from("e");
                        if let Some(&sign) = lookahead.peek() {
                            if sign == '+' || sign == '-' {
                                exponent.push(sign);
                                lookahead.next();
                            }
                        }
                        if lookahead.peek().map_or(false, |d| d.is_ascii_digit()) {
                            while let Some(&d) = lookahead.peek() {
                                if d.is_ascii_digit() {
                                    exponent.push(d);
                                    lookahead.next();
                                } else {
                                    break;
                                }
                            }
                            num_str.push_str(&exponent);
                            chars = lookahead;
                        }
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

/// Deepest nesting a query may use, counting parentheses, unary operators,
/// function calls and operator chains
pub const MAX_NESTING: usize = 128;

fn check_nesting(level: usize) -> Result<(), String> {
    if level > MAX_NESTING {
        Err(format!("Expression nested too deeply (limit {})", MAX_NESTING))
    } else {
        Ok(())
    }
}

// Lowest precedence: logical or
fn parse_or(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_and(tokens, pos, depth)?;
    let mut height = left.height();

    while pos < tokens.len() {
        if let Token::OrOr = &tokens[pos] {
            let (right, new_pos) = parse_and(tokens, pos + 1, depth)?;
            height = height.max(right.height()) + 1;
            check_nesting(height)?;
            left = Expr::BinaryOp {
                op: Op::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
            pos = new_pos;
        } else {
            break;
        }
    }

    Ok((left, pos))
}

fn parse_and(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_equality(tokens, pos, depth)?;
    let mut height = left.height();

    while pos < tokens.len() {
        if let Token::AndAnd = &tokens[pos] {
            let (right, new_pos) = parse_equality(tokens, pos + 1, depth)?;
            height = height.max(right.height()) + 1;
            check_nesting(height)?;
            left = Expr::BinaryOp {
                op: Op::And,
                left: Box::new(left),
                right: Box::new(right),
            };
            pos = new_pos;
        } else {
            break;
        }
    }

    Ok((left, pos))
}

fn parse_equality(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_relational(tokens, pos, depth)?;
    let mut height = left.height();

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::EqEq => Op::Eq,
            Token::BangEq => Op::NotEq,
            Token::EqEqEq => Op::StrictEq,
            Token::BangEqEq => Op::StrictNotEq,
            _ => break,
        };
        let (right, new_pos) = parse_relational(tokens, pos + 1, depth)?;
        height = height.max(right.height()) + 1;
        check_nesting(height)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_relational(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_add_sub(tokens, pos, depth)?;
    let mut height = left.height();

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Lt => Op::Lt,
            Token::LtEq => Op::LtEq,
            Token::Gt => Op::Gt,
            Token::GtEq => Op::GtEq,
            _ => break,
        };
        let (right, new_pos) = parse_add_sub(tokens, pos + 1, depth)?;
        height = height.max(right.height()) + 1;
        check_nesting(height)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos, depth)?;
    let mut height = left.height();

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1, depth)?;
        height = height.max(right.height()) + 1;
        check_nesting(height)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos, depth)?;
    let mut height = left.height();

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            Token::Percent => Op::Rem,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1, depth)?;
        height = height.max(right.height()) + 1;
        check_nesting(height)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    check_nesting(depth)?;
    match tokens.get(pos) {
        Some(Token::Bang) => {
            let (expr, pos) = parse_unary(tokens, pos + 1, depth + 1)?;
            Ok((Expr::Not(Box::new(expr)), pos))
        }
        Some(Token::Minus) => {
            let (expr, pos) = parse_unary(tokens, pos + 1, depth + 1)?;
            Ok((Expr::Negate(Box::new(expr)), pos))
        }
        // Unary plus is a no-op
        Some(Token::Plus) => parse_unary(tokens, pos + 1, depth + 1),
        _ => parse_primary(tokens, pos, depth),
    }
}

fn parse_primary(tokens: &[Token], pos: usize, depth: usize) -> Result<(Expr, usize), String> {
    if pos >= tokens.len() {
        return Err("Unexpected end of expression".to_string());
    }

    match &tokens[pos] {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::True => Ok((Expr::Boolean(true), pos + 1)),
        Token::False => Ok((Expr::Boolean(false), pos + 1)),
        Token::Null => Ok((Expr::Null, pos + 1)),
        Token::Ident(name) => {
            if let Some(Token::LParen) = tokens.get(pos + 1) {
                let (args, new_pos) = parse_function_args(tokens, pos + 2, depth + 1)?;
                return Ok((
                    Expr::Function {
                        name: normalize_function_name(name),
                        args,
                    },
                    new_pos,
                ));
            }
            Ok((Expr::Ident(name.clone()), pos + 1))
        }
        Token::LParen => {
            let (expr, pos) = parse_or(tokens, pos + 1, depth + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                Some(other) => Err(format!("Expected ')' but found {}", describe(other))),
                None => Err("Missing closing parenthesis".to_string()),
            }
        }
        other => Err(format!("Unexpected {} at position {}", describe(other), pos)),
    }
}

fn parse_function_args(
    tokens: &[Token],
    pos: usize,
    depth: usize,
) -> Result<(Vec<Expr>, usize), String> {
    let mut args = Vec::new();

    if let Some(Token::RParen) = tokens.get(pos) {
        return Ok((args, pos + 1));
    }

    let mut pos = pos;
    loop {
        let (arg, new_pos) = parse_or(tokens, pos, depth)?;
        args.push(arg);
        match tokens.get(new_pos) {
            Some(Token::Comma) => pos = new_pos + 1,
            Some(Token::RParen) => return Ok((args, new_pos + 1)),
            Some(other) => {
                return Err(format!("Expected ',' or ')' but found {}", describe(other)))
            }
            None => return Err("Missing closing parenthesis in function call".to_string()),
        }
    }
}

/// `startsWith`, `starts_with` and `STARTSWITH` all name the same function
fn normalize_function_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
