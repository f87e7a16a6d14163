// This module derives the basic-block structure of a function before
// lowering: LABEL pseudo-instructions start named blocks, and any instruction
// the backend classifies as block-ending (branches, returns) closes the
// current block so the following instruction opens a fresh anonymous one.
// Anonymous blocks are named b{N} and user labels are sanitized with a
// distinct prefix, so the two namespaces cannot collide. Blocks are index
// ranges into the instruction stream rather than owned copies; a LABEL
// aliasing an empty labeled block maps both names to the same block.

//! Basic-block discovery shared by both architecture backends.

use std::collections::HashMap;

use super::source::{Instr, Operand};
use super::writer::block_label;

/// One contiguous instruction range forming a basic block.
#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    /// Range into the function's instruction list. May include leading LABEL
    /// pseudo-instructions, which lowering skips.
    pub start: usize,
    pub end: usize,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Split an instruction stream into blocks.
///
/// `ends_block` classifies instructions that always terminate their block
/// (unconditional/conditional branches and returns). Returns the blocks in
/// discovery order plus the user-label → block-index map used by the branch
/// resolver.
pub fn split_blocks(
    instrs: &[Instr],
    ends_block: impl Fn(&Instr) -> bool,
) -> (Vec<Block>, HashMap<String, usize>) {
    let mut blocks = vec![Block {
        name: "b0".to_string(),
        start: 0,
        end: 0,
    }];
    let mut labels = HashMap::new();

    for (i, ins) in instrs.iter().enumerate() {
        if &*ins.op == "LABEL" {
            let label = match ins.args.first() {
                Some(Operand::Label(l)) => l.to_string(),
                Some(Operand::Ident(l)) => l.to_string(),
                _ => continue,
            };
            let cur = blocks.len() - 1;
            if blocks[cur].is_empty() {
                // Empty block: attach this label here instead of opening
                // another empty block (covers consecutive labels).
                if !blocks[cur].name.starts_with("lbl.") {
                    blocks[cur].name = block_label(&label);
                }
                blocks[cur].start = i + 1;
                blocks[cur].end = i + 1;
            } else {
                blocks.push(Block {
                    name: block_label(&label),
                    start: i + 1,
                    end: i + 1,
                });
            }
            labels.insert(label, blocks.len() - 1);
            continue;
        }

        let cur = blocks.len() - 1;
        if blocks[cur].is_empty() {
            blocks[cur].start = i;
        }
        blocks[cur].end = i + 1;

        if ends_block(ins) && i + 1 < instrs.len() {
            let name = format!("b{}", blocks.len());
            blocks.push(Block {
                name,
                start: i + 1,
                end: i + 1,
            });
        }
    }

    // A trailing branch can leave an empty final block; keep it only if a
    // label points at it (it then falls through to the implicit return).
    if blocks.len() > 1 {
        let last = blocks.len() - 1;
        if blocks[last].is_empty() && !labels.values().any(|&b| b == last) {
            blocks.pop();
        }
    }

    (blocks, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::Operand;

    fn ins(op: &str, args: Vec<Operand>) -> Instr {
        Instr::new(op, args)
    }

    #[test]
    fn labels_and_branches_split() {
        let instrs = vec![
            ins("MOVQ", vec![]),
            ins("JMP", vec![Operand::label("done")]),
            ins("LABEL", vec![Operand::label("done")]),
            ins("RET", vec![]),
        ];
        let (blocks, labels) = split_blocks(&instrs, |i| {
            matches!(&*i.op, "JMP" | "RET")
        });
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "b0");
        assert_eq!(blocks[1].name, "lbl.done");
        assert_eq!(labels["done"], 1);
    }

    #[test]
    fn conditional_branch_opens_fallthrough_block() {
        let instrs = vec![
            ins("JEQ", vec![Operand::label("x")]),
            ins("MOVQ", vec![]),
            ins("LABEL", vec![Operand::label("x")]),
            ins("RET", vec![]),
        ];
        let (blocks, _) = split_blocks(&instrs, |i| matches!(&*i.op, "JEQ" | "RET"));
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].name, "b1");
        assert_eq!(blocks[1].start, 1);
    }
}
