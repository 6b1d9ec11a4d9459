//! Expression compiler and stack machine.
//!
//! Infix source compiles via shunting-yard into a postfix program of
//! [`ExprInstr`]s; a compile-time stack simulation rejects programs that
//! would not leave exactly one value. Evaluation prefers 64-bit integer
//! arithmetic and falls back to doubles, except for the integer-only
//! operators (`%`, bit ops, shifts, rotates) which reject doubles outright.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    flow::{EvalResult, FlowResult, Interrupt},
    heap::{Heap, ObjId},
    interp::Interp,
    parse::{TokenKind, Tokenizer, unescape},
    value::{IntParseError, Repr, parse_double_bytes, parse_int_bytes},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExprOp {
    /// Push a literal operand.
    Operand,
    /// Push the value of a variable.
    Variable,
    /// Push the value of a dict-sugar read.
    DictSugar,
    /// Push the result of a nested command.
    Command,
    Not,
    BitNot,
    UnaryMinus,
    UnaryPlus,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    RotateLeft,
    RotateRight,
    ShiftLeft,
    ShiftRight,
    Lt,
    Gt,
    Le,
    Ge,
    NumEq,
    NumNe,
    StrEq,
    StrNe,
    BitAnd,
    BitXor,
    BitOr,
    LogicAnd,
    LogicOr,
}

impl ExprOp {
    /// Values consumed from the stack; operands consume none.
    fn arity(self) -> usize {
        match self {
            Self::Operand | Self::Variable | Self::DictSugar | Self::Command => 0,
            Self::Not | Self::BitNot | Self::UnaryMinus | Self::UnaryPlus => 1,
            _ => 2,
        }
    }

    fn precedence(self) -> u16 {
        match self {
            Self::Not | Self::BitNot | Self::UnaryMinus | Self::UnaryPlus => 300,
            Self::Mul | Self::Div | Self::Mod => 200,
            Self::Add | Self::Sub => 100,
            Self::RotateLeft | Self::RotateRight | Self::ShiftLeft | Self::ShiftRight => 90,
            Self::Lt | Self::Gt | Self::Le | Self::Ge => 80,
            Self::NumEq | Self::NumNe => 70,
            Self::StrEq | Self::StrNe => 60,
            Self::BitAnd => 50,
            Self::BitXor => 49,
            Self::BitOr => 48,
            Self::LogicAnd | Self::LogicOr => 10,
            Self::Operand | Self::Variable | Self::DictSugar | Self::Command => 0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ExprInstr {
    pub op: ExprOp,
    /// Operand value for leaf instructions.
    pub obj: Option<ObjId>,
}

/// A compiled expression program; shared like `ScriptRep`.
#[derive(Debug)]
pub(crate) struct ExprRep {
    pub program: Vec<ExprInstr>,
}

fn operator_from_text(text: &[u8], prev_operand: bool) -> Option<ExprOp> {
    Some(match text {
        b"!" => ExprOp::Not,
        b"~" => ExprOp::BitNot,
        b"-" if !prev_operand => ExprOp::UnaryMinus,
        b"+" if !prev_operand => ExprOp::UnaryPlus,
        b"*" => ExprOp::Mul,
        b"/" => ExprOp::Div,
        b"%" => ExprOp::Mod,
        b"-" => ExprOp::Sub,
        b"+" => ExprOp::Add,
        b"<<<" => ExprOp::RotateLeft,
        b">>>" => ExprOp::RotateRight,
        b"<<" => ExprOp::ShiftLeft,
        b">>" => ExprOp::ShiftRight,
        b"<" => ExprOp::Lt,
        b">" => ExprOp::Gt,
        b"<=" => ExprOp::Le,
        b">=" => ExprOp::Ge,
        b"==" => ExprOp::NumEq,
        b"!=" => ExprOp::NumNe,
        b"eq" => ExprOp::StrEq,
        b"ne" => ExprOp::StrNe,
        b"&&" => ExprOp::LogicAnd,
        b"||" => ExprOp::LogicOr,
        b"&" => ExprOp::BitAnd,
        b"^" => ExprOp::BitXor,
        b"|" => ExprOp::BitOr,
        // `?`/`:` are recognized but reserved.
        _ => return None,
    })
}

enum StackEntry {
    Op(ExprOp),
    Paren,
}

fn compile_failed(heap: &mut Heap, program: Vec<ExprInstr>, msg: &str) -> Result<ExprRep, Interrupt> {
    for instr in program {
        if let Some(obj) = instr.obj {
            heap.dec_ref(obj);
        }
    }
    Err(Interrupt::error(msg))
}

/// Compiles expression source to a postfix program.
pub(crate) fn compile_expr(heap: &mut Heap, src: &[u8]) -> Result<ExprRep, Interrupt> {
    let mut tokenizer = Tokenizer::new(src, 1);
    let mut program: Vec<ExprInstr> = Vec::new();
    let mut ops: Vec<StackEntry> = Vec::new();
    let mut prev_operand = false;

    while let Some(token) = tokenizer.next_expr_token() {
        match token.kind {
            TokenKind::ExprNumber => {
                let obj = match parse_int_bytes(token.text) {
                    Ok(v) => heap.new_int(v),
                    Err(IntParseError::TooBig) => {
                        return compile_failed(heap, program, "integer value too big to be represented");
                    }
                    Err(IntParseError::Invalid) => match parse_double_bytes(token.text) {
                        Some(v) => heap.new_double(v),
                        None => return compile_failed(heap, program, "syntax error in expression"),
                    },
                };
                program.push(ExprInstr { op: ExprOp::Operand, obj: Some(obj) });
                prev_operand = true;
            }
            TokenKind::Str => {
                let obj = heap.new_string(token.text.to_vec());
                program.push(ExprInstr { op: ExprOp::Operand, obj: Some(obj) });
                prev_operand = true;
            }
            TokenKind::Esc => {
                let obj = heap.new_string(unescape(token.text));
                program.push(ExprInstr { op: ExprOp::Operand, obj: Some(obj) });
                prev_operand = true;
            }
            TokenKind::Var | TokenKind::DictSugar | TokenKind::Cmd => {
                let op = match token.kind {
                    TokenKind::Var => ExprOp::Variable,
                    TokenKind::DictSugar => ExprOp::DictSugar,
                    _ => ExprOp::Command,
                };
                let obj = heap.new_string(token.text.to_vec());
                program.push(ExprInstr { op, obj: Some(obj) });
                prev_operand = true;
            }
            TokenKind::SubexprStart => {
                ops.push(StackEntry::Paren);
                prev_operand = false;
            }
            TokenKind::SubexprEnd => loop {
                match ops.pop() {
                    Some(StackEntry::Op(op)) => program.push(ExprInstr { op, obj: None }),
                    Some(StackEntry::Paren) => {
                        prev_operand = true;
                        break;
                    }
                    None => return compile_failed(heap, program, "unexpected close parenthesis"),
                }
            },
            TokenKind::ExprOperator => {
                let Some(op) = operator_from_text(token.text, prev_operand) else {
                    return compile_failed(heap, program, "syntax error in expression");
                };
                if op.arity() == 2 {
                    while let Some(StackEntry::Op(top)) = ops.last() {
                        if top.precedence() >= op.precedence() {
                            program.push(ExprInstr { op: *top, obj: None });
                            ops.pop();
                        } else {
                            break;
                        }
                    }
                }
                ops.push(StackEntry::Op(op));
                prev_operand = false;
            }
            _ => return compile_failed(heap, program, "syntax error in expression"),
        }
    }
    while let Some(entry) = ops.pop() {
        match entry {
            StackEntry::Op(op) => program.push(ExprInstr { op, obj: None }),
            StackEntry::Paren => return compile_failed(heap, program, "missing close parenthesis"),
        }
    }

    // Stack-effect check: the program must leave exactly one value.
    let mut depth = 0i64;
    for instr in &program {
        let arity = instr.op.arity() as i64;
        if depth < arity {
            return compile_failed(heap, program, "syntax error in expression");
        }
        depth -= arity;
        depth += 1;
    }
    if depth != 1 {
        return compile_failed(heap, program, "syntax error in expression");
    }
    Ok(ExprRep { program })
}

impl Heap {
    /// Borrows the compiled expression rep, compiling and caching on first
    /// use.
    pub(crate) fn get_expr_rep(&mut self, id: ObjId) -> FlowResult<Rc<ExprRep>> {
        if let Repr::Expr(rep) = &self.get(id).repr {
            return Ok(Rc::clone(rep));
        }
        let src = self.get_string(id).to_vec();
        let rep = Rc::new(compile_expr(self, &src)?);
        self.set_repr(id, Repr::Expr(Rc::clone(&rep)));
        Ok(rep)
    }
}

impl Interp {
    /// Evaluates an expression value, using its cached program when present.
    pub(crate) fn eval_expr_obj(&mut self, id: ObjId) -> EvalResult {
        self.heap.inc_ref(id);
        let rep = match self.heap.get_expr_rep(id) {
            Ok(rep) => rep,
            Err(e) => {
                self.heap.dec_ref(id);
                return Err(e);
            }
        };
        let result = self.run_expr_program(&rep);
        self.heap.release_expr_rep(rep);
        self.heap.dec_ref(id);
        result
    }

    fn run_expr_program(&mut self, rep: &ExprRep) -> EvalResult {
        let mut stack: SmallVec<[ObjId; 10]> = SmallVec::new();
        for instr in &rep.program {
            if let Err(e) = self.expr_step(instr, &mut stack) {
                for obj in stack.drain(..) {
                    self.heap.dec_ref(obj);
                }
                return Err(e);
            }
        }
        debug_assert_eq!(stack.len(), 1, "compile-time check guarantees a single result");
        Ok(stack.pop().expect("expression program leaves one value"))
    }

    fn expr_step(&mut self, instr: &ExprInstr, stack: &mut SmallVec<[ObjId; 10]>) -> FlowResult<()> {
        let operand = instr.obj;
        let value = match instr.op {
            ExprOp::Operand => {
                let obj = operand.expect("operand instruction carries a value");
                self.heap.inc_ref(obj);
                obj
            }
            ExprOp::Variable => self.get_var_value_obj(operand.expect("variable instruction carries a name"))?,
            ExprOp::DictSugar => self.dict_sugar_value(operand.expect("sugar instruction carries a name"))?,
            ExprOp::Command => self.eval_obj(operand.expect("command instruction carries a script"))?,
            op if op.arity() == 1 => {
                let a = stack.pop().expect("stack depth checked at compile time");
                let result = self.expr_unary(op, a);
                self.heap.dec_ref(a);
                result?
            }
            op => {
                let b = stack.pop().expect("stack depth checked at compile time");
                let a = stack.pop().expect("stack depth checked at compile time");
                let result = self.expr_binary(op, a, b);
                self.heap.dec_ref(a);
                self.heap.dec_ref(b);
                result?
            }
        };
        stack.push(value);
        Ok(())
    }

    fn expr_unary(&mut self, op: ExprOp, a: ObjId) -> EvalResult {
        match op {
            ExprOp::Not => {
                let value = self.heap.get_boolean(a)?;
                Ok(self.heap.new_bool(!value))
            }
            ExprOp::BitNot => {
                if self.heap.is_double_repr(a) {
                    return Err(Interrupt::error("got floating-point value where integer was expected"));
                }
                let value = self.heap.get_int(a)?;
                Ok(self.heap.new_int(!value))
            }
            ExprOp::UnaryMinus | ExprOp::UnaryPlus => {
                let negate = op == ExprOp::UnaryMinus;
                if !self.heap.is_double_repr(a)
                    && let Some(value) = self.heap.probe_int(a)
                {
                    return Ok(self.heap.new_int(if negate { value.wrapping_neg() } else { value }));
                }
                let value = self.heap.get_double(a)?;
                Ok(self.heap.new_double(if negate { -value } else { value }))
            }
            _ => unreachable!("binary op dispatched as unary"),
        }
    }

    fn expr_binary(&mut self, op: ExprOp, a: ObjId, b: ObjId) -> EvalResult {
        match op {
            ExprOp::StrEq | ExprOp::StrNe => {
                let equal = self.heap.string_eq(a, b);
                Ok(self.heap.new_bool((op == ExprOp::StrEq) == equal))
            }
            ExprOp::LogicAnd => {
                let x = self.heap.get_boolean(a)?;
                let y = self.heap.get_boolean(b)?;
                Ok(self.heap.new_bool(x && y))
            }
            ExprOp::LogicOr => {
                let x = self.heap.get_boolean(a)?;
                let y = self.heap.get_boolean(b)?;
                Ok(self.heap.new_bool(x || y))
            }
            ExprOp::Mod
            | ExprOp::BitAnd
            | ExprOp::BitXor
            | ExprOp::BitOr
            | ExprOp::ShiftLeft
            | ExprOp::ShiftRight
            | ExprOp::RotateLeft
            | ExprOp::RotateRight => {
                if self.heap.is_double_repr(a) || self.heap.is_double_repr(b) {
                    return Err(Interrupt::error("got floating-point value where integer was expected"));
                }
                let x = self.heap.get_int(a)?;
                let y = self.heap.get_int(b)?;
                let value = match op {
                    ExprOp::Mod => {
                        if y == 0 {
                            return Err(Interrupt::error("Division by zero"));
                        }
                        x.wrapping_rem(y)
                    }
                    ExprOp::BitAnd => x & y,
                    ExprOp::BitXor => x ^ y,
                    ExprOp::BitOr => x | y,
                    ExprOp::ShiftLeft => x.wrapping_shl(y as u32),
                    ExprOp::ShiftRight => x.wrapping_shr(y as u32),
                    // Rotations act on the low 32 bits, counts wrap mod 32.
                    ExprOp::RotateLeft => i64::from((x as u32).rotate_left((y as u32) % 32)),
                    ExprOp::RotateRight => i64::from((x as u32).rotate_right((y as u32) % 32)),
                    _ => unreachable!(),
                };
                Ok(self.heap.new_int(value))
            }
            ExprOp::Add
            | ExprOp::Sub
            | ExprOp::Mul
            | ExprOp::Div
            | ExprOp::Lt
            | ExprOp::Gt
            | ExprOp::Le
            | ExprOp::Ge
            | ExprOp::NumEq
            | ExprOp::NumNe => {
                // Integer evaluation first: a double rep on either side (a
                // value that is only a double) forces the double path.
                if !self.heap.is_double_repr(a)
                    && !self.heap.is_double_repr(b)
                    && let Some(x) = self.heap.probe_int(a)
                    && let Some(y) = self.heap.probe_int(b)
                {
                    let value = match op {
                        ExprOp::Add => self.heap.new_int(x.wrapping_add(y)),
                        ExprOp::Sub => self.heap.new_int(x.wrapping_sub(y)),
                        ExprOp::Mul => self.heap.new_int(x.wrapping_mul(y)),
                        ExprOp::Div => {
                            if y == 0 {
                                return Err(Interrupt::error("Division by zero"));
                            }
                            self.heap.new_int(x.wrapping_div(y))
                        }
                        ExprOp::Lt => self.heap.new_bool(x < y),
                        ExprOp::Gt => self.heap.new_bool(x > y),
                        ExprOp::Le => self.heap.new_bool(x <= y),
                        ExprOp::Ge => self.heap.new_bool(x >= y),
                        ExprOp::NumEq => self.heap.new_bool(x == y),
                        ExprOp::NumNe => self.heap.new_bool(x != y),
                        _ => unreachable!(),
                    };
                    return Ok(value);
                }
                let x = self.heap.get_double(a)?;
                let y = self.heap.get_double(b)?;
                let value = match op {
                    ExprOp::Add => self.heap.new_double(x + y),
                    ExprOp::Sub => self.heap.new_double(x - y),
                    ExprOp::Mul => self.heap.new_double(x * y),
                    ExprOp::Div => self.heap.new_double(x / y),
                    ExprOp::Lt => self.heap.new_bool(x < y),
                    ExprOp::Gt => self.heap.new_bool(x > y),
                    ExprOp::Le => self.heap.new_bool(x <= y),
                    ExprOp::Ge => self.heap.new_bool(x >= y),
                    ExprOp::NumEq => self.heap.new_bool(x == y),
                    ExprOp::NumNe => self.heap.new_bool(x != y),
                    _ => unreachable!(),
                };
                Ok(value)
            }
            _ => unreachable!("leaf or unary op dispatched as binary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(src: &str) -> Result<Vec<ExprOp>, String> {
        let mut heap = Heap::new();
        match compile_expr(&mut heap, src.as_bytes()) {
            Ok(rep) => Ok(rep.program.iter().map(|i| i.op).collect()),
            Err(Interrupt::Error(msg)) => Err(String::from_utf8_lossy(&msg).into_owned()),
            Err(_) => Err("unexpected interrupt".to_owned()),
        }
    }

    #[test]
    fn precedence_orders_postfix() {
        assert_eq!(
            ops("1+2*3").unwrap(),
            vec![ExprOp::Operand, ExprOp::Operand, ExprOp::Operand, ExprOp::Mul, ExprOp::Add]
        );
        assert_eq!(
            ops("(1+2)*3").unwrap(),
            vec![ExprOp::Operand, ExprOp::Operand, ExprOp::Add, ExprOp::Operand, ExprOp::Mul]
        );
    }

    #[test]
    fn unary_minus_detection() {
        assert_eq!(ops("-1").unwrap(), vec![ExprOp::Operand, ExprOp::UnaryMinus]);
        assert_eq!(
            ops("2--1").unwrap(),
            vec![ExprOp::Operand, ExprOp::Operand, ExprOp::UnaryMinus, ExprOp::Sub]
        );
    }

    #[test]
    fn paren_errors() {
        assert_eq!(ops("(1").unwrap_err(), "missing close parenthesis");
        assert_eq!(ops("1)").unwrap_err(), "unexpected close parenthesis");
    }

    #[test]
    fn stack_effect_check_rejects() {
        assert_eq!(ops("1 +").unwrap_err(), "syntax error in expression");
        assert_eq!(ops("1 2").unwrap_err(), "syntax error in expression");
        assert_eq!(ops("*").unwrap_err(), "syntax error in expression");
        assert_eq!(ops("").unwrap_err(), "syntax error in expression");
    }

    #[test]
    fn ternary_is_reserved() {
        assert_eq!(ops("1 ? 2 : 3").unwrap_err(), "syntax error in expression");
    }

    #[test]
    fn string_operands_compile() {
        assert_eq!(
            ops("\"a\" eq {b}").unwrap(),
            vec![ExprOp::Operand, ExprOp::Operand, ExprOp::StrEq]
        );
    }
}
