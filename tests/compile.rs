//! End-to-end tests: tokenize, parse and generate whole programs, checking
//! the emitted assembly document byte for byte where the format is pinned.

use jamc::compile;

#[test]
fn empty_function() {
  let asm = compile("\n  function main()\n  end\n").unwrap();
  let expected = concat!(
    ".data\n",
    "\n",
    "\n",
    ".text\n",
    "\n",
    ".global main\n",
    "main:\n",
    "\n",
    "endmain:\n",
    "\tbx lr\n",
    "\n",
    "\n",
    "\n",
    "/* externals */\n",
  );
  assert_eq!(asm, expected);
}

#[test]
fn local_declaration() {
  let asm = compile("\n  function main()\n    local bob = 1\n  end\n").unwrap();
  let expected = concat!(
    ".data\n",
    "\n",
    "return0: .word\t0\n",
    "\n",
    ".text\n",
    "\n",
    ".global main\n",
    "main:\n",
    "\n",
    "\tldr r0, addr_return0\n",
    "\tstr lr, [r0]\n",
    "\n",
    "\tmov r1, #1\n",
    "\n",
    "\tldr lr, addr_return0\n",
    "\tldr lr, [lr]\n",
    "\n",
    "endmain:\n",
    "\tbx lr\n",
    "\n",
    "\n",
    "addr_return0: .word return0\n",
    "\n",
    "/* externals */\n",
  );
  assert_eq!(asm, expected);
}

#[test]
fn local_declaration_and_return() {
  let asm = compile("\n  function main()\n    local bob = 1\n    return 0\n  end\n").unwrap();
  let expected = concat!(
    ".data\n",
    "\n",
    "return0: .word\t0\n",
    "\n",
    ".text\n",
    "\n",
    ".global main\n",
    "main:\n",
    "\n",
    "\tldr r0, addr_return0\n",
    "\tstr lr, [r0]\n",
    "\n",
    "\tmov r1, #1\n",
    "\n",
    "\t/* start assembledata() */\n",
    "\tmov r2, #0\n",
    "\tmov r0, r2\n",
    "\t/* end assembledata() */\n",
    "\n",
    "\n",
    "\tldr lr, addr_return0\n",
    "\tldr lr, [lr]\n",
    "\n",
    "endmain:\n",
    "\tbx lr\n",
    "\n",
    "\n",
    "addr_return0: .word return0\n",
    "\n",
    "/* externals */\n",
  );
  assert_eq!(asm, expected);
}

#[test]
fn comments_do_not_affect_the_program() {
  let asm = compile("\n  function main()\n    // bob = 1\n    return 0\n  end\n").unwrap();
  let expected = concat!(
    ".data\n",
    "\n",
    "return0: .word\t0\n",
    "\n",
    ".text\n",
    "\n",
    ".global main\n",
    "main:\n",
    "\n",
    "\tldr r0, addr_return0\n",
    "\tstr lr, [r0]\n",
    "\n",
    "\n",
    "\t/* start assembledata() */\n",
    "\tmov r1, #0\n",
    "\tmov r0, r1\n",
    "\t/* end assembledata() */\n",
    "\n",
    "\n",
    "\tldr lr, addr_return0\n",
    "\tldr lr, [lr]\n",
    "\n",
    "endmain:\n",
    "\tbx lr\n",
    "\n",
    "\n",
    "addr_return0: .word return0\n",
    "\n",
    "/* externals */\n",
  );
  assert_eq!(asm, expected);
}

#[test]
fn literal_loads_use_immediates_not_memory() {
  // `local bob = 1` must move the literal, never load it from a data slot;
  // the only `.data` entry is the link-register slot.
  let asm = compile("function main()\n  local bob = 1\nend").unwrap();
  assert!(asm.contains("\tmov r1, #1\n"));
  assert!(!asm.contains("ldr r1"));
  let data_section = asm.split(".text").next().unwrap();
  assert!(!data_section.contains(".asciz"));
}

#[test]
fn expression_chain_reduces_left_to_right() {
  let asm = compile("function main()\n  local a = 1 + 2 - 3\nend").unwrap();
  assert!(asm.contains(concat!(
    "\tmov r1, #1\n",
    "\tmov r2, #2\n",
    "\tadd r1, r1, r2\n",
    "\tmov r3, #3\n",
    "\tsub r1, r1, r3\n",
  )));
}

#[test]
fn program_with_calls_conditionals_and_strings() {
  let source = concat!(
    "greeting = \"hello\"\n",
    "function count(limit)\n",
    "  local n = 0\n",
    "  while n < limit then\n",
    "    local n = n + 1\n",
    "  end while\n",
    "  return n\n",
    "end\n",
    "function main()\n",
    "  print(greeting, 3)\n",
    "  count(3)\n",
    "  if 1 == 1 then\n",
    "    return 0\n",
    "  end if\n",
    "end\n",
  );
  let asm = compile(source).unwrap();

  // Data: the global string, two link-register slots, the format string.
  assert!(asm.contains("greeting0: .asciz\t\"hello\""));
  assert!(asm.contains("return0: .word\t0"));
  assert!(asm.contains("return1: .word\t0"));
  assert!(asm.contains(".asciz\t\"%s %d\\n\""));

  // The while loop tests after its body and branches back on success.
  assert!(asm.contains("startcount0:"));
  assert!(asm.contains("\tblt startcount0\n"));

  // The if exits through the inverted condition.
  assert!(asm.contains("\tbne endmain0\n"));

  // The nested return takes the early-exit branch.
  assert!(asm.contains("\tb endmain\n"));

  // Calls and the external table.
  assert!(asm.contains("\tbl count\n"));
  assert!(asm.contains("\tbl printf\n"));
  assert!(asm.ends_with("/* externals */\n.global\tprintf\n"));

  // Every data entry has an address-table line.
  assert!(asm.contains("addr_greeting0: .word greeting0"));
  assert!(asm.contains("addr_return0: .word return0"));
  assert!(asm.contains("addr_return1: .word return1"));
}

#[test]
fn compile_surfaces_lexer_and_parser_errors() {
  assert!(compile("function main()\n  local x = $\nend").is_err());
  assert!(compile("function main(").is_err());
  assert!(compile("function main()\n  if 1 < 2\nend").is_err());
}
