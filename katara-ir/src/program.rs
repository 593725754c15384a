use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;

use crate::{Func, FuncNum, StructuralError};

/// An IR program: numbered funcs and a designated entry func. Func
/// numbers are allocated monotonically and never recycled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    funcs: BTreeMap<FuncNum, Func>,
    func_count: i64,
    entry: Option<FuncNum>,
}

impl Program {
    /// Creates an empty program.
    pub fn new() -> Program {
        Program::default()
    }

    /// The funcs, ordered by number.
    pub fn funcs(&self) -> impl Iterator<Item = &Func> {
        self.funcs.values()
    }

    /// The func numbers, ascending.
    pub fn func_nums(&self) -> impl Iterator<Item = FuncNum> + '_ {
        self.funcs.keys().copied()
    }

    /// The entry func number, if set.
    pub fn entry(&self) -> Option<FuncNum> {
        self.entry
    }

    /// Sets or clears the entry func.
    pub fn set_entry(&mut self, entry: Option<FuncNum>) -> Result<(), StructuralError> {
        if let Some(num) = entry {
            if !self.funcs.contains_key(&num) {
                return Err(StructuralError::UnknownFunc(num));
            }
        }
        self.entry = entry;
        Ok(())
    }

    /// Whether the program owns a func with the given number.
    pub fn has_func(&self, num: FuncNum) -> bool {
        self.funcs.contains_key(&num)
    }

    /// The func with the given number.
    pub fn func(&self, num: FuncNum) -> Option<&Func> {
        self.funcs.get(&num)
    }

    /// Mutable access to the func with the given number.
    pub fn func_mut(&mut self, num: FuncNum) -> Option<&mut Func> {
        self.funcs.get_mut(&num)
    }

    /// Adds a func with a fresh number and returns the number.
    pub fn add_func(&mut self) -> FuncNum {
        let num = self.func_count;
        self.func_count += 1;
        self.funcs.insert(num, Func::new(num));
        num
    }

    /// Adds a func with an explicit number; the number must be unused.
    pub fn add_func_with_num(&mut self, num: FuncNum) -> Result<(), StructuralError> {
        if self.funcs.contains_key(&num) {
            return Err(StructuralError::FuncNumInUse(num));
        }
        self.func_count = self.func_count.max(num + 1);
        self.funcs.insert(num, Func::new(num));
        Ok(())
    }

    /// Removes a func. Clears the entry if it pointed at the func; the
    /// number is not recycled.
    pub fn remove_func(&mut self, num: FuncNum) -> Result<(), StructuralError> {
        if self.funcs.remove(&num).is_none() {
            return Err(StructuralError::UnknownFunc(num));
        }
        if self.entry == Some(num) {
            self.entry = None;
        }
        Ok(())
    }

    /// The func with the given name, if exactly known.
    pub fn func_with_name(&self, name: &str) -> Option<&Func> {
        self.funcs.values().find(|func| func.name() == name)
    }

    /// Validates every func.
    pub fn validate(&self) -> Result<(), StructuralError> {
        for func in self.funcs.values() {
            func.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.funcs.values().join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_numbers_are_monotone_and_never_recycled() {
        let mut program = Program::new();
        assert_eq!(program.add_func(), 0);
        assert_eq!(program.add_func(), 1);
        program.remove_func(0).unwrap();
        assert_eq!(program.add_func(), 2);
        program.add_func_with_num(10).unwrap();
        assert!(program.add_func_with_num(10).is_err());
        assert_eq!(program.add_func(), 11);
    }

    #[test]
    fn removing_the_entry_func_clears_the_entry() {
        let mut program = Program::new();
        let main = program.add_func();
        program.set_entry(Some(main)).unwrap();
        program.remove_func(main).unwrap();
        assert_eq!(program.entry(), None);
        assert!(program.remove_func(main).is_err());
    }

    #[test]
    fn lookup_by_name() {
        let mut program = Program::new();
        let num = program.add_func();
        program.func_mut(num).unwrap().set_name("main");
        assert_eq!(program.func_with_name("main").unwrap().num(), num);
        assert!(program.func_with_name("other").is_none());
    }
}
