//! Expression parsing by precedence climbing.
//!
//! Binding strength, loosest first: assignment, ternary, `??`, `||`, `&&`, `|`, `^`, `&`,
//! equality, comparison (with `is` and `as`), shifts, additive (`+ - .`), multiplicative,
//! `**`, prefix operators, postfix operators. Calls, indexing and `++`/`--` only continue an
//! expression when they start on the same line.

use crate::ast::*;
use crate::lexer::TokenKind;
use crate::parser::{describe, unquote, Parser};
use crate::span::Range;

enum Infix {
    Binary(BinaryOp),
    Is,
    As,
}

impl Parser {
    pub(crate) fn parse_expr(&mut self) -> Expr {
        if !self.descend() {
            return self.error_expr();
        }
        let expr = self.parse_assignment();
        self.ascend();
        expr
    }

    fn error_expr(&self) -> Expr {
        Expr {
            kind: ExprKind::Error,
            range: Range::empty(self.start()),
        }
    }

    fn parse_assignment(&mut self) -> Expr {
        let start = self.start();
        let target = self.parse_ternary();
        let op = match self.kind() {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            TokenKind::SlashEq => AssignOp::Div,
            TokenKind::DotEq => AssignOp::Concat,
            TokenKind::QuestionQuestionEq => AssignOp::Coalesce,
            _ => return target,
        };
        self.bump();
        let value = self.parse_expr();
        Expr {
            kind: ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            range: self.range_from(start),
        }
    }

    fn parse_ternary(&mut self) -> Expr {
        let start = self.start();
        let cond = self.parse_coalesce();
        if !self.at(TokenKind::Question) {
            return cond;
        }
        self.bump();
        let then = if self.eat(TokenKind::Colon).is_some() {
            None
        } else {
            let then = self.parse_expr();
            self.expect(TokenKind::Colon, "':'");
            Some(Box::new(then))
        };
        if !self.descend() {
            return self.error_expr();
        }
        let otherwise = self.parse_ternary();
        self.ascend();
        Expr {
            kind: ExprKind::Ternary {
                cond: Box::new(cond),
                then,
                otherwise: Box::new(otherwise),
            },
            range: self.range_from(start),
        }
    }

    fn parse_coalesce(&mut self) -> Expr {
        let mut operands = vec![self.parse_binary(1)];
        while self.eat(TokenKind::QuestionQuestion).is_some() {
            operands.push(self.parse_binary(1));
        }
        // `??` is right associative.
        let mut rhs = operands.pop().unwrap_or_else(|| self.error_expr());
        while let Some(lhs) = operands.pop() {
            let range = lhs.range.merge(rhs.range);
            rhs = Expr {
                kind: ExprKind::Coalesce {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                range,
            };
        }
        rhs
    }

    fn infix(&self) -> Option<(u8, Infix)> {
        let binary = |prec, op| Some((prec, Infix::Binary(op)));
        match self.kind() {
            TokenKind::OrOr => binary(1, BinaryOp::Or),
            TokenKind::AndAnd => binary(2, BinaryOp::And),
            TokenKind::Pipe => binary(3, BinaryOp::BitOr),
            TokenKind::Caret => binary(4, BinaryOp::BitXor),
            TokenKind::Amp => binary(5, BinaryOp::BitAnd),
            TokenKind::EqEq => binary(6, BinaryOp::Eq),
            TokenKind::NotEq => binary(6, BinaryOp::NotEq),
            TokenKind::EqEqEq => binary(6, BinaryOp::Identical),
            TokenKind::NotEqEq => binary(6, BinaryOp::NotIdentical),
            TokenKind::Lt => binary(7, BinaryOp::Lt),
            TokenKind::Gt => binary(7, BinaryOp::Gt),
            TokenKind::Le => binary(7, BinaryOp::Le),
            TokenKind::Ge => binary(7, BinaryOp::Ge),
            TokenKind::Is => Some((7, Infix::Is)),
            TokenKind::As if !self.no_as => Some((7, Infix::As)),
            TokenKind::Shl => binary(8, BinaryOp::Shl),
            TokenKind::Shr => binary(8, BinaryOp::Shr),
            TokenKind::Plus => binary(9, BinaryOp::Add),
            TokenKind::Minus => binary(9, BinaryOp::Sub),
            TokenKind::Dot => binary(9, BinaryOp::Concat),
            TokenKind::Star => binary(10, BinaryOp::Mul),
            TokenKind::Slash => binary(10, BinaryOp::Div),
            TokenKind::Percent => binary(10, BinaryOp::Mod),
            TokenKind::StarStar => binary(11, BinaryOp::Pow),
            _ => None,
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Expr {
        let start = self.start();
        let mut lhs = self.parse_unary();
        while let Some((prec, infix)) = self.infix() {
            if prec < min_prec {
                break;
            }
            self.bump();
            lhs = match infix {
                Infix::Is | Infix::As => {
                    let ty = self
                        .parse_type()
                        .unwrap_or_else(|| TypeNode::named("mixed", Range::empty(self.start())));
                    let expr = Box::new(lhs);
                    let kind = match infix {
                        Infix::Is => ExprKind::Is { expr, ty },
                        _ => ExprKind::Cast { expr, ty },
                    };
                    Expr {
                        kind,
                        range: self.range_from(start),
                    }
                }
                Infix::Binary(op) => {
                    // `**` is right associative.
                    let next_min = if op == BinaryOp::Pow { prec } else { prec + 1 };
                    if !self.descend() {
                        return self.error_expr();
                    }
                    let rhs = self.parse_binary(next_min);
                    self.ascend();
                    Expr {
                        kind: ExprKind::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        range: self.range_from(start),
                    }
                }
            };
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.start();
        let op = match self.kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::PlusPlus => UnaryOp::PreInc,
            TokenKind::MinusMinus => UnaryOp::PreDec,
            TokenKind::Await | TokenKind::At => {
                let token = self.bump();
                if !self.descend() {
                    return self.error_expr();
                }
                let operand = self.parse_unary();
                self.ascend();
                if token.kind == TokenKind::At {
                    return operand;
                }
                return Expr {
                    kind: ExprKind::Await(Box::new(operand)),
                    range: self.range_from(start),
                };
            }
            _ => return self.parse_postfix(),
        };
        self.bump();
        if !self.descend() {
            return self.error_expr();
        }
        let operand = self.parse_unary();
        self.ascend();
        Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            range: self.range_from(start),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let start = self.start();
        let mut expr = self.parse_primary();
        loop {
            let token = self.peek();
            let same_line = !token.newline_before;
            expr = match token.kind {
                TokenKind::LParen if same_line => {
                    let args = self.parse_args();
                    let range = self.range_from(start);
                    match expr.kind {
                        ExprKind::StaticAccess { class, member } => Expr {
                            kind: ExprKind::StaticCall {
                                class,
                                method: member,
                                args,
                            },
                            range,
                        },
                        kind => Expr {
                            kind: ExprKind::Call {
                                callee: Box::new(Expr {
                                    kind,
                                    range: expr.range,
                                }),
                                args,
                            },
                            range,
                        },
                    }
                }
                TokenKind::LBracket if same_line => {
                    self.bump();
                    let index = (!self.at(TokenKind::RBracket))
                        .then(|| Box::new(self.parse_expr()));
                    self.expect(TokenKind::RBracket, "']'");
                    Expr {
                        kind: ExprKind::Index {
                            target: Box::new(expr),
                            index,
                        },
                        range: self.range_from(start),
                    }
                }
                TokenKind::Arrow | TokenKind::SafeArrow => {
                    let safe = self.bump().kind == TokenKind::SafeArrow;
                    let Some(name) = self.member_name() else {
                        return expr;
                    };
                    if self.at(TokenKind::LParen) && !self.peek().newline_before {
                        let args = self.parse_args();
                        Expr {
                            kind: ExprKind::MethodCall {
                                receiver: Box::new(expr),
                                method: name,
                                args,
                                safe,
                            },
                            range: self.range_from(start),
                        }
                    } else {
                        Expr {
                            kind: ExprKind::Property {
                                receiver: Box::new(expr),
                                property: name,
                                safe,
                            },
                            range: self.range_from(start),
                        }
                    }
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus if same_line => {
                    let op = if self.bump().kind == TokenKind::PlusPlus {
                        PostfixOp::Inc
                    } else {
                        PostfixOp::Dec
                    };
                    Expr {
                        kind: ExprKind::Postfix {
                            op,
                            operand: Box::new(expr),
                        },
                        range: self.range_from(start),
                    }
                }
                _ => return expr,
            };
        }
    }

    fn parse_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        self.bump();
        let saved = std::mem::replace(&mut self.no_as, false);
        while !self.at(TokenKind::RParen) && !self.at_eof() {
            self.eat(TokenKind::Ellipsis);
            if self.at(TokenKind::Identifier) && self.nth(1).kind == TokenKind::Colon {
                // named argument
                self.bump();
                self.bump();
            }
            args.push(self.parse_expr());
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.no_as = saved;
        self.expect(TokenKind::RParen, "')'");
        args
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.start();
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Int => {
                self.bump();
                ExprKind::Int(parse_int(&token.text))
            }
            TokenKind::Float => {
                self.bump();
                ExprKind::Float(token.text.replace('_', "").parse().unwrap_or(0.0))
            }
            TokenKind::String => {
                self.bump();
                ExprKind::Str(unquote(&token.text))
            }
            TokenKind::True | TokenKind::False => {
                self.bump();
                ExprKind::Bool(token.kind == TokenKind::True)
            }
            TokenKind::Null => {
                self.bump();
                ExprKind::Null
            }
            TokenKind::Variable => {
                self.bump();
                ExprKind::Variable(Self::ident(&token))
            }
            TokenKind::Identifier | TokenKind::Static => {
                self.bump();
                let name = Self::ident(&token);
                if self.eat(TokenKind::DoubleColon).is_some() {
                    let member = if self.at(TokenKind::Variable) {
                        let member = self.bump();
                        Some(Self::ident(&member))
                    } else {
                        self.member_name()
                    };
                    match member {
                        Some(member) => ExprKind::StaticAccess {
                            class: name,
                            member,
                        },
                        None => ExprKind::Name(name),
                    }
                } else {
                    ExprKind::Name(name)
                }
            }
            TokenKind::LParen => {
                self.bump();
                let saved = std::mem::replace(&mut self.no_as, false);
                let inner = self.parse_expr();
                self.no_as = saved;
                self.expect(TokenKind::RParen, "')'");
                return inner;
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::New => {
                self.bump();
                let class = self
                    .parse_type_atom()
                    .unwrap_or_else(|| TypeNode::named("", Range::empty(self.start())));
                let args = if self.at(TokenKind::LParen) && !self.peek().newline_before {
                    self.parse_args()
                } else {
                    Vec::new()
                };
                ExprKind::New { class, args }
            }
            TokenKind::Function => self.parse_closure(),
            TokenKind::Fn => self.parse_arrow(),
            TokenKind::Match => self.parse_match(),
            _ => {
                let found = describe(&token);
                self.error_here(format!("expected expression, found {found}"));
                if !matches!(
                    token.kind,
                    TokenKind::RParen
                        | TokenKind::RBrace
                        | TokenKind::RBracket
                        | TokenKind::Semicolon
                        | TokenKind::Comma
                        | TokenKind::Eof
                ) {
                    self.bump();
                }
                return Expr {
                    kind: ExprKind::Error,
                    range: token.range,
                };
            }
        };
        Expr {
            kind,
            range: self.range_from(start),
        }
    }

    fn parse_array(&mut self) -> ExprKind {
        self.bump();
        let saved = std::mem::replace(&mut self.no_as, false);
        let mut items = Vec::new();
        let mut entries = Vec::new();
        while !self.at(TokenKind::RBracket) && !self.at_eof() {
            self.eat(TokenKind::Ellipsis);
            let first = self.parse_expr();
            if self.eat(TokenKind::FatArrow).is_some() {
                let value = self.parse_expr();
                entries.push(MapEntry { key: first, value });
            } else {
                items.push(first);
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.no_as = saved;
        self.expect(TokenKind::RBracket, "']'");
        if entries.is_empty() {
            return ExprKind::Array(items);
        }
        // Positional items in a keyed literal get their implicit index as key.
        for (idx, item) in items.into_iter().enumerate() {
            entries.push(MapEntry {
                key: Expr {
                    kind: ExprKind::Int(idx as i64),
                    range: item.range,
                },
                value: item,
            });
        }
        ExprKind::Map(entries)
    }

    fn parse_closure(&mut self) -> ExprKind {
        self.bump();
        let params = self.parse_params();
        let mut uses = Vec::new();
        if self.eat(TokenKind::Use).is_some() {
            self.expect(TokenKind::LParen, "'('");
            while !self.at(TokenKind::RParen) && !self.at_eof() {
                self.eat(TokenKind::Amp);
                match self.expect(TokenKind::Variable, "captured variable") {
                    Some(token) => uses.push(Self::ident(&token)),
                    None => break,
                }
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')'");
        }
        let return_type = self.eat(TokenKind::Colon).and_then(|_| self.parse_type());
        let body = self.parse_block();
        ExprKind::Closure(Box::new(Closure {
            params,
            return_type,
            uses,
            body,
        }))
    }

    fn parse_arrow(&mut self) -> ExprKind {
        self.bump();
        let params = self.parse_params();
        let return_type = self.eat(TokenKind::Colon).and_then(|_| self.parse_type());
        self.expect(TokenKind::FatArrow, "'=>'");
        let body = self.parse_expr();
        ExprKind::Arrow(Box::new(ArrowFn {
            params,
            return_type,
            body,
        }))
    }

    fn parse_match(&mut self) -> ExprKind {
        self.bump();
        let subject = self.parse_paren_expr();
        let mut arms = Vec::new();
        if self.expect(TokenKind::LBrace, "'{'").is_some() {
            while !self.at(TokenKind::RBrace) && !self.at_eof() {
                let before = self.pos_marker();
                let start = self.start();
                let mut patterns = Vec::new();
                let is_default = self.eat(TokenKind::Default).is_some();
                if !is_default {
                    loop {
                        patterns.push(self.parse_expr());
                        if self.eat(TokenKind::Comma).is_none() || self.at(TokenKind::FatArrow) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::FatArrow, "'=>'");
                let body = self.parse_expr();
                arms.push(MatchArm {
                    patterns,
                    is_default,
                    body,
                    range: self.range_from(start),
                });
                if self.eat(TokenKind::Comma).is_none() && !self.at(TokenKind::RBrace) {
                    if self.pos_marker() == before {
                        self.bump();
                    } else if !self.peek().newline_before {
                        self.error_here("expected ',' between match arms");
                        self.bump();
                    }
                }
            }
            self.expect(TokenKind::RBrace, "'}'");
        }
        ExprKind::Match(Box::new(MatchExpr { subject, arms }))
    }
}

fn parse_int(text: &str) -> i64 {
    let digits = text.replace('_', "");
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        i64::from_str_radix(bin, 2)
    } else {
        digits.parse()
    };
    parsed.unwrap_or(0)
}
