use rheap::{Heap, HeapConfig, HeapError, ProgramBreak, Segment};

/// Prints the current program break.
fn print_program_break(
  heap: &Heap<ProgramBreak>,
  label: &str,
) {
  println!(
    "[{}] PID = {}, program break = {:#x}",
    label,
    std::process::id(),
    heap.segment().current(),
  );
}

fn main() -> Result<(), HeapError> {
  env_logger::init();

  let config = HeapConfig::from_env()?;
  let mut heap = Heap::with_config(ProgramBreak, config);

  print_program_break(&heap, "start");
  heap.initialize()?;

  let a = heap.allocate(333)?;
  let b = heap.allocate(1)?;

  heap.print()?;
  println!("----");

  heap.free(b)?;

  heap.print()?;
  println!("----");

  // 555 rounds up to 576, which does not fit the 64 byte hole left by `b`.
  let c = heap.allocate(555)?;

  heap.print()?;
  println!("----");

  let c = heap.reallocate(c, 2000)?;
  println!("grew tail block in place: {:p}", c);

  let a = heap.reallocate(a, 1000)?;
  println!("moved first block to {:p}", a);

  heap.print()?;
  println!("----");

  print_program_break(&heap, "before reset");
  heap.reset()?;
  print_program_break(&heap, "after reset");

  Ok(())
}
