use super::scanner::{Scanner, Token};
use crate::{
    BinaryALInstr, BinaryALOp, BlockNum, BlockValue, CallInstr, CompareInstr, CompareOp,
    Computed, Constant, Func, InheritedValue, Instr, JumpCondInstr, JumpInstr, MovInstr,
    PhiInstr, Program, ReturnInstr, StructuralError, Type, UnaryALInstr, UnaryALOp,
    Value,
};

/// Failure to parse the IR text form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A character outside the token vocabulary.
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    /// The input did not follow the grammar.
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        /// What the grammar required here.
        expected: &'static str,
        /// The token actually scanned.
        found: String,
    },
    /// A literal that does not fit its type.
    #[error("number out of range")]
    NumberOutOfRange,
    /// An identifier in operation position that names no instruction.
    #[error("unknown instruction mnemonic {0:?}")]
    UnknownMnemonic(String),
    /// An instruction with the wrong number of results.
    #[error("{0} instruction can not define {1} results")]
    WrongResultCount(&'static str, usize),
    /// The parsed program violated an IR invariant.
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Parses a whole program from its printed form. The first block of
/// each func becomes its entry; a func named `main` becomes the program
/// entry.
pub fn parse_program(text: &str) -> Result<Program, ParseError> {
    let mut parser = Parser {
        scanner: Scanner::new(text)?,
    };
    parser.parse_program()
}

struct Parser<'a> {
    scanner: Scanner<'a>,
}

impl Parser<'_> {
    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::new();
        self.skip_newlines()?;
        while self.scanner.token() != &Token::Eof {
            self.parse_func(&mut program)?;
            self.skip_newlines()?;
        }
        if let Some(main) = program.func_with_name("main").map(|f| f.num()) {
            program.set_entry(Some(main))?;
        }
        Ok(program)
    }

    // `@N [name] (args) => (types) {` blocks `}`
    fn parse_func(&mut self, program: &mut Program) -> Result<(), ParseError> {
        self.expect(Token::At, "\"@\"")?;
        let num = self.parse_num()?;
        program.add_func_with_num(num)?;
        let func = program.func_mut(num).expect("func added above");

        if let Token::Ident(name) = self.scanner.token() {
            func.set_name(name.clone());
            self.scanner.advance()?;
        }

        self.expect(Token::LParen, "\"(\"")?;
        while self.scanner.token() != &Token::RParen {
            if !func.args().is_empty() {
                self.expect(Token::Comma, "\",\"")?;
            }
            let arg = self.parse_computed_with_type()?;
            func.args_mut().push(arg);
        }
        self.expect(Token::RParen, "\")\"")?;
        self.expect(Token::Arrow, "\"=>\"")?;
        self.expect(Token::LParen, "\"(\"")?;
        while self.scanner.token() != &Token::RParen {
            if !func.result_types().is_empty() {
                self.expect(Token::Comma, "\",\"")?;
            }
            let typ = self.parse_type()?;
            func.result_types_mut().push(typ);
        }
        self.expect(Token::RParen, "\")\"")?;
        self.expect(Token::LBrace, "\"{\"")?;
        self.expect(Token::NewLine, "newline")?;

        let mut entry = None;
        loop {
            self.skip_newlines()?;
            match self.scanner.token() {
                Token::RBrace => {
                    self.scanner.advance()?;
                    break;
                }
                Token::LBrace => {
                    let block_num = self.parse_block(func)?;
                    entry.get_or_insert(block_num);
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "block header or \"}\"",
                        found: other.describe(),
                    });
                }
            }
        }
        func.set_entry(entry)?;
        connect_control_flow(func)?;
        Ok(())
    }

    // `{N}:` instr lines
    fn parse_block(&mut self, func: &mut Func) -> Result<BlockNum, ParseError> {
        let num = self.parse_block_num()?;
        self.expect(Token::Colon, "\":\"")?;
        self.expect(Token::NewLine, "newline")?;
        func.add_block_with_num(num)?;
        loop {
            self.skip_newlines()?;
            match self.scanner.token() {
                Token::LBrace | Token::RBrace => return Ok(num),
                _ => {
                    let instr = self.parse_instr()?;
                    func.block_mut(num).expect("block added above").push(instr);
                }
            }
        }
    }

    fn parse_instr(&mut self) -> Result<Instr, ParseError> {
        let mut results = Vec::new();
        if self.scanner.token() == &Token::Percent {
            loop {
                results.push(self.parse_computed_with_type()?);
                if self.scanner.token() == &Token::Comma {
                    self.scanner.advance()?;
                } else {
                    break;
                }
            }
            self.expect(Token::Equal, "\"=\"")?;
        }

        let mnemonic = self.parse_ident("instruction mnemonic")?;
        let instr = match mnemonic.as_str() {
            "mov" => {
                let result = single_result("mov", results)?;
                let origin = self.parse_value_with_type()?;
                Instr::from(MovInstr::new(result, origin).map_err(ParseError::from)?)
            }
            "phi" => {
                let result = single_result("phi", results)?;
                let mut args = Vec::new();
                loop {
                    args.push(self.parse_inherited_value()?);
                    if self.scanner.token() == &Token::Comma {
                        self.scanner.advance()?;
                    } else {
                        break;
                    }
                }
                Instr::from(PhiInstr::new(result, args)?)
            }
            "jmp" => {
                expect_no_results("jmp", results)?;
                Instr::from(JumpInstr::new(self.parse_block_value()?))
            }
            "jcc" => {
                expect_no_results("jcc", results)?;
                let cond = self.parse_value(Type::Bool)?;
                self.expect(Token::Comma, "\",\"")?;
                let dest_true = self.parse_block_value()?;
                self.expect(Token::Comma, "\",\"")?;
                let dest_false = self.parse_block_value()?;
                Instr::from(JumpCondInstr::new(cond, dest_true, dest_false)?)
            }
            "call" => {
                let callee = self.parse_callee()?;
                let mut args = Vec::new();
                while self.scanner.token() == &Token::Comma {
                    self.scanner.advance()?;
                    args.push(self.parse_value_with_type()?);
                }
                Instr::from(CallInstr::new(callee, results, args)?)
            }
            "ret" => {
                expect_no_results("ret", results)?;
                let mut args = Vec::new();
                while self.scanner.token() != &Token::NewLine
                    && self.scanner.token() != &Token::Eof
                {
                    if !args.is_empty() {
                        self.expect(Token::Comma, "\",\"")?;
                    }
                    args.push(self.parse_value_with_type()?);
                }
                Instr::from(ReturnInstr::new(args))
            }
            op_str => {
                let typ = {
                    self.expect(Token::Colon, "\":\"")?;
                    self.parse_type()?
                };
                if let Ok(op) = op_str.parse::<UnaryALOp>() {
                    let result = single_result("unary al", results)?;
                    let operand = self.parse_value(typ)?;
                    Instr::from(UnaryALInstr::new(op, result, operand)?)
                } else if let Ok(op) = op_str.parse::<BinaryALOp>() {
                    let result = single_result("binary al", results)?;
                    let operand_a = self.parse_value(typ)?;
                    self.expect(Token::Comma, "\",\"")?;
                    let operand_b = self.parse_value(typ)?;
                    Instr::from(BinaryALInstr::new(op, result, operand_a, operand_b)?)
                } else if let Ok(op) = op_str.parse::<CompareOp>() {
                    let result = single_result("compare", results)?;
                    let operand_a = self.parse_value(typ)?;
                    self.expect(Token::Comma, "\",\"")?;
                    let operand_b = self.parse_value(typ)?;
                    Instr::from(CompareInstr::new(op, result, operand_a, operand_b)?)
                } else {
                    return Err(ParseError::UnknownMnemonic(op_str.to_owned()));
                }
            }
        };
        if self.scanner.token() == &Token::NewLine {
            self.scanner.advance()?;
        }
        Ok(instr)
    }

    // `%N:T`
    fn parse_computed_with_type(&mut self) -> Result<Computed, ParseError> {
        self.expect(Token::Percent, "\"%\"")?;
        let num = self.parse_num()?;
        self.expect(Token::Colon, "\":\"")?;
        let typ = self.parse_type()?;
        Ok(Computed::new(typ, num))
    }

    // A value carrying its own type: `%N:T`, `#N:T`, `#t`, `#f`, `@N`.
    fn parse_value_with_type(&mut self) -> Result<Value, ParseError> {
        match self.scanner.token() {
            Token::Percent => Ok(self.parse_computed_with_type()?.into()),
            Token::At => {
                self.scanner.advance()?;
                Ok(Constant::func(self.parse_num()?).into())
            }
            Token::Hash => {
                self.scanner.advance()?;
                match self.scanner.token().clone() {
                    Token::Ident(flag) if flag == "t" || flag == "f" => {
                        self.scanner.advance()?;
                        Ok(Constant::bool(flag == "t").into())
                    }
                    Token::Number {
                        negative,
                        magnitude,
                    } => {
                        self.scanner.advance()?;
                        let bits = signed_bits(negative, magnitude)?;
                        self.expect(Token::Colon, "\":\"")?;
                        let typ = self.parse_type()?;
                        Ok(Constant::new(typ, bits)?.into())
                    }
                    other => Err(ParseError::UnexpectedToken {
                        expected: "constant literal",
                        found: other.describe(),
                    }),
                }
            }
            other => Err(ParseError::UnexpectedToken {
                expected: "value",
                found: other.describe(),
            }),
        }
    }

    // A value whose type comes from context, e.g. an AL operand.
    fn parse_value(&mut self, expected: Type) -> Result<Value, ParseError> {
        match self.scanner.token() {
            Token::Percent => {
                self.scanner.advance()?;
                let num = self.parse_num()?;
                Ok(Computed::new(expected, num).into())
            }
            Token::At => {
                self.scanner.advance()?;
                Ok(Constant::func(self.parse_num()?).into())
            }
            Token::Hash => {
                self.scanner.advance()?;
                match self.scanner.token().clone() {
                    Token::Ident(flag) if flag == "t" || flag == "f" => {
                        self.scanner.advance()?;
                        Ok(Constant::bool(flag == "t").into())
                    }
                    Token::Number {
                        negative,
                        magnitude,
                    } => {
                        self.scanner.advance()?;
                        let bits = signed_bits(negative, magnitude)?;
                        if self.scanner.token() == &Token::Colon {
                            self.scanner.advance()?;
                            self.parse_type()?;
                        }
                        Ok(Constant::new(expected, bits)?.into())
                    }
                    other => Err(ParseError::UnexpectedToken {
                        expected: "constant literal",
                        found: other.describe(),
                    }),
                }
            }
            other => Err(ParseError::UnexpectedToken {
                expected: "value",
                found: other.describe(),
            }),
        }
    }

    // `@N` or `%N`, typed func.
    fn parse_callee(&mut self) -> Result<Value, ParseError> {
        match self.scanner.token() {
            Token::At => {
                self.scanner.advance()?;
                Ok(Constant::func(self.parse_num()?).into())
            }
            Token::Percent => {
                self.scanner.advance()?;
                Ok(Computed::new(Type::Func, self.parse_num()?).into())
            }
            other => Err(ParseError::UnexpectedToken {
                expected: "callee",
                found: other.describe(),
            }),
        }
    }

    // `<value-with-type>:{N}`
    fn parse_inherited_value(&mut self) -> Result<InheritedValue, ParseError> {
        let value = self.parse_value_with_type()?;
        self.expect(Token::Colon, "\":\"")?;
        let origin = self.parse_block_value()?;
        Ok(InheritedValue::new(value, origin)?)
    }

    // `{N}`
    fn parse_block_value(&mut self) -> Result<BlockValue, ParseError> {
        Ok(BlockValue::new(self.parse_block_num()?))
    }

    fn parse_block_num(&mut self) -> Result<BlockNum, ParseError> {
        self.expect(Token::LBrace, "\"{\"")?;
        let num = self.parse_num()?;
        self.expect(Token::RBrace, "\"}\"")?;
        Ok(num)
    }

    fn parse_num(&mut self) -> Result<i64, ParseError> {
        match *self.scanner.token() {
            Token::Number {
                negative: false,
                magnitude,
            } if magnitude <= i64::MAX as u64 => {
                self.scanner.advance()?;
                Ok(magnitude as i64)
            }
            ref other => Err(ParseError::UnexpectedToken {
                expected: "number",
                found: other.describe(),
            }),
        }
    }

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        let name = self.parse_ident("type")?;
        Ok(Type::parse(&name)?)
    }

    fn parse_ident(&mut self, expected: &'static str) -> Result<String, ParseError> {
        match self.scanner.token().clone() {
            Token::Ident(name) => {
                self.scanner.advance()?;
                Ok(name)
            }
            other => Err(ParseError::UnexpectedToken {
                expected,
                found: other.describe(),
            }),
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ParseError> {
        if self.scanner.token() == &token {
            self.scanner.advance()?;
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                expected,
                found: self.scanner.token().describe(),
            })
        }
    }

    fn skip_newlines(&mut self) -> Result<(), ParseError> {
        while self.scanner.token() == &Token::NewLine {
            self.scanner.advance()?;
        }
        Ok(())
    }
}

fn single_result(instr: &'static str, results: Vec<Computed>) -> Result<Computed, ParseError> {
    if results.len() == 1 {
        Ok(results[0])
    } else {
        Err(ParseError::WrongResultCount(instr, results.len()))
    }
}

fn expect_no_results(instr: &'static str, results: Vec<Computed>) -> Result<(), ParseError> {
    if results.is_empty() {
        Ok(())
    } else {
        Err(ParseError::WrongResultCount(instr, results.len()))
    }
}

fn signed_bits(negative: bool, magnitude: u64) -> Result<i64, ParseError> {
    if negative {
        if magnitude > (i64::MAX as u64) + 1 {
            return Err(ParseError::NumberOutOfRange);
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        // Large unsigned literals wrap into the 64-bit pattern.
        Ok(magnitude as i64)
    }
}

// Derive parent/child edge sets from the parsed terminators.
fn connect_control_flow(func: &mut Func) -> Result<(), ParseError> {
    let mut edges = Vec::new();
    for block in func.blocks() {
        if let Some(terminator) = block.terminator() {
            for target in terminator.successors() {
                edges.push((block.num(), target));
            }
        }
    }
    for (parent, child) in edges {
        func.add_control_flow(parent, child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_minimal_func() {
        let text = "@0 main () => (i64) {\n{0}:\n\t%0:i64 = mov #42:i64\n\tret %0:i64\n}\n";
        let program = parse_program(text).unwrap();
        assert_eq!(program.entry(), Some(0));
        let func = program.func(0).unwrap();
        assert_eq!(func.name(), "main");
        assert_eq!(func.entry(), Some(0));
        assert_eq!(func.result_types(), &[Type::I64]);
        assert_eq!(func.block(0).unwrap().instrs().len(), 2);
        program.validate().unwrap();
    }

    #[test]
    fn derives_control_flow_edges() {
        let text = "@0 () => () {\n{0}:\n\tjcc #t, {1}, {2}\n{1}:\n\tjmp {2}\n{2}:\n\tret\n}\n";
        let program = parse_program(text).unwrap();
        let func = program.func(0).unwrap();
        assert_eq!(
            func.block(0).unwrap().children().iter().copied().collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(func.block(2).unwrap().parents().len(), 2);
        assert_eq!(program.entry(), None);
    }

    #[test]
    fn round_trips_a_loop_with_phis() {
        let mut text = String::new();
        text.push_str("@0 main () => (i64) {\n");
        text.push_str("{0}:\n");
        text.push_str("\t%0:i64 = mov #0:i64\n");
        text.push_str("\tjmp {1}\n");
        text.push_str("{1}:\n");
        text.push_str("\t%1:i64 = phi %0:i64:{0}, %2:i64:{1}\n");
        text.push_str("\t%2:i64 = add:i64 %1, #1:i64\n");
        text.push_str("\t%3:b = lt:i64 %2, #10\n");
        text.push_str("\tjcc %3, {1}, {2}\n");
        text.push_str("{2}:\n");
        text.push_str("\tret %2:i64\n");
        text.push_str("}");
        let program = parse_program(&text).unwrap();
        program.validate().unwrap();
        let printed = program.to_string();
        let reparsed = parse_program(&printed).unwrap();
        assert_eq!(program, reparsed);
    }

    #[test]
    fn round_trips_calls_and_constants() {
        let text = "@0 main () => (i64) {\n{0}:\n\t%0:i64 = call @1, #3:i64\n\tret %0:i64\n}\n\n\
                    @1 double (%0:i64) => (i64) {\n{0}:\n\t%1:i64 = add:i64 %0, %0\n\tret %1:i64\n}\n";
        let program = parse_program(text).unwrap();
        program.validate().unwrap();
        let reparsed = parse_program(&program.to_string()).unwrap();
        assert_eq!(program, reparsed);
    }

    #[test]
    fn rejects_unknown_mnemonics_and_types() {
        assert!(matches!(
            parse_program("@0 () => () {\n{0}:\n\t%0:i64 = frob:i64 %1\n}\n"),
            Err(ParseError::UnknownMnemonic(_))
        ));
        assert!(parse_program("@0 () => (i128) {\n}\n").is_err());
    }

    #[test]
    fn rejects_duplicate_func_and_block_numbers() {
        assert!(matches!(
            parse_program("@0 () => () {\n}\n@0 () => () {\n}\n"),
            Err(ParseError::Structural(StructuralError::FuncNumInUse(0)))
        ));
        assert!(matches!(
            parse_program("@0 () => () {\n{0}:\n\tret\n{0}:\n\tret\n}\n"),
            Err(ParseError::Structural(StructuralError::BlockNumInUse(0)))
        ));
    }

    #[test]
    fn parses_bool_and_unsigned_constants() {
        let text =
            "@0 () => (b, u64) {\n{0}:\n\t%0:b = mov #t\n\t%1:u64 = mov #18446744073709551615:u64\n\tret %0:b, %1:u64\n}\n";
        let program = parse_program(text).unwrap();
        let reparsed = parse_program(&program.to_string()).unwrap();
        assert_eq!(program, reparsed);
    }
}
