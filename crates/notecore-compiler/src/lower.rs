use notecore_bytecode::{CompiledExpr, Expr, Instr};
use notecore_rational::Rational;

/// Emits a post-order instruction sequence for `expr`, interning literal
/// constants into a shared pool (small linear scan — expressions are tiny).
pub fn lower(expr: &Expr) -> CompiledExpr {
    let mut instrs = Vec::new();
    let mut constants: Vec<Rational> = Vec::new();
    emit(expr, &mut instrs, &mut constants);
    CompiledExpr::from_instrs(instrs, constants)
}

fn intern(constants: &mut Vec<Rational>, value: Rational) -> u16 {
    if let Some(idx) = constants.iter().position(|c| c.equals(&value)) {
        return idx as u16;
    }
    constants.push(value);
    (constants.len() - 1) as u16
}

fn emit(expr: &Expr, instrs: &mut Vec<Instr>, constants: &mut Vec<Rational>) {
    match expr {
        Expr::Const(r) => instrs.push(Instr::LoadConst(intern(constants, r.clone()))),
        Expr::Base(var) => instrs.push(Instr::LoadBase(*var)),
        Expr::Ref(note, var) => instrs.push(Instr::LoadRef(*note, *var)),
        Expr::Tempo(note) => instrs.push(Instr::LoadTempo(*note)),
        Expr::MeasureLen(note) => instrs.push(Instr::LoadMeasureLen(*note)),
        Expr::Add(a, b) => {
            emit(a, instrs, constants);
            emit(b, instrs, constants);
            instrs.push(Instr::Add);
        }
        Expr::Sub(a, b) => {
            emit(a, instrs, constants);
            emit(b, instrs, constants);
            instrs.push(Instr::Sub);
        }
        Expr::Mul(a, b) => {
            emit(a, instrs, constants);
            emit(b, instrs, constants);
            instrs.push(Instr::Mul);
        }
        Expr::Div(a, b) => {
            emit(a, instrs, constants);
            emit(b, instrs, constants);
            instrs.push(Instr::Div);
        }
        Expr::Pow(a, b) => {
            emit(a, instrs, constants);
            emit(b, instrs, constants);
            instrs.push(Instr::Pow);
        }
        Expr::Neg(a) => {
            emit(a, instrs, constants);
            instrs.push(Instr::Neg);
        }
    }
}

/// Depth of the expression tree, used to enforce `CompilerConfig::max_depth`.
pub fn depth(expr: &Expr) -> usize {
    match expr {
        Expr::Const(_) | Expr::Base(_) | Expr::Ref(_, _) | Expr::Tempo(_) | Expr::MeasureLen(_) => 1,
        Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Pow(a, b) => {
            1 + depth(a).max(depth(b))
        }
        Expr::Neg(a) => 1 + depth(a),
    }
}
