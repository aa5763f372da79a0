use ilstage::{
    Backend, BackendCall, BufferError, BufferOptions, FieldRef, InstructionBuffer, LocalScope,
    MethodRef, NativeLabel, NativeLocal, OpCode, RecordingBackend, TypeRef,
};
use pretty_assertions::assert_eq;

fn int32() -> TypeRef {
    TypeRef::value("System.Int32")
}

/// A guarded division with a catch and a finally, two locals sharing slot 1.
fn guarded_divide() -> (InstructionBuffer, Vec<LocalScope>) {
    let exception = TypeRef::class("System.DivideByZeroException");
    let counter = FieldRef::new_static(TypeRef::class("Stats"), "failures", int32());
    let report = MethodRef::new_static(
        TypeRef::class("Stats"),
        "Report",
        TypeRef::void(),
        [TypeRef::class("System.String")],
    );

    let mut buffer = InstructionBuffer::with_options(&BufferOptions {
        entry_anchor: Some("entry".into()),
        ..Default::default()
    });
    let result = buffer.declare_local("result", 0, int32());
    let quotient = buffer.declare_local("quotient", 1, int32());
    let quotient_at = buffer.len() - 1;
    buffer.begin_exception_block();
    buffer.emit(OpCode::Ldarg0);
    buffer.emit(OpCode::Ldarg1);
    buffer.emit(OpCode::Div);
    buffer.emit(OpCode::Stloc1);
    buffer.emit(OpCode::Ldloc1);
    buffer.emit(OpCode::Stloc0);
    let quotient_released = buffer.len();
    buffer.begin_catch_block(exception);
    buffer.emit(OpCode::Pop);
    let failures = buffer.declare_local("failures", 1, int32());
    let failures_at = buffer.len() - 1;
    buffer.emit_field(OpCode::Ldsfld, counter);
    buffer.emit(OpCode::Stloc1);
    buffer.emit_i32(OpCode::LdcI4, -1);
    buffer.emit(OpCode::Stloc0);
    buffer.end_catch_block();
    buffer.begin_finally_block();
    buffer.emit_str(OpCode::Ldstr, "done");
    buffer.emit_method(OpCode::Call, report);
    buffer.end_finally_block();
    buffer.end_exception_block();
    buffer.emit_local(OpCode::Ldloc, &result);
    buffer.emit(OpCode::Ret);

    let scopes = vec![
        LocalScope::new(result, 1),
        LocalScope::new(quotient, quotient_at).released(quotient_released),
        LocalScope::new(failures, failures_at),
    ];
    (buffer, scopes)
}

#[test]
fn test_describe_guarded_divide() {
    let (buffer, scopes) = guarded_divide();
    let lines = buffer.describe(&scopes).unwrap();

    let expected = [
        "\nentry:",
        "",
        "",
        "--BeginExceptionBlock--",
        "ldarg.0",
        "ldarg.1",
        "div",
        "stloc.1 // quotient",
        "ldloc.1 // quotient",
        "stloc.0 // result",
        "--BeginCatchBlock(System.DivideByZeroException)--",
        "pop",
        "",
        "ldsfld System.Int32 failures",
        "stloc.1 // failures",
        "ldc.i4 -1",
        "stloc.0 // result",
        "--EndCatchBlock--",
        "--BeginFinallyBlock--",
        "ldstr 'done'",
        "call System.Void Report(System.String)",
        "--EndFinallyBlock--",
        "--EndExceptionBlock--",
        "ldloc result",
        "ret",
    ];
    assert_eq!(lines, expected);
}

#[test]
fn test_describe_reports_missing_scope() {
    let (buffer, mut scopes) = guarded_divide();
    scopes.pop();

    let err = buffer.describe(&scopes).unwrap_err();
    assert_eq!(err, BufferError::MissingScope { slot: 1, index: 14 });
    assert_eq!(err.to_string(), "no local is in scope for slot 1 at step 14");
}

#[test]
fn test_flush_guarded_divide() {
    let (mut buffer, _) = guarded_divide();
    let mut backend = RecordingBackend::new();
    let trace = buffer.flush(&mut backend);

    assert_eq!(
        backend.mnemonics(),
        vec![
            "ldarg.0", "ldarg.1", "div", "stloc.1", "ldloc.1", "stloc.0", "pop", "ldsfld",
            "stloc.1", "ldc.i4", "stloc.0", "ldstr", "call", "ldloc", "ret",
        ]
    );
    assert_eq!(
        &backend.calls()[..3],
        &[
            BackendCall::DeclareLocal(int32(), NativeLocal(0)),
            BackendCall::DeclareLocal(int32(), NativeLocal(1)),
            BackendCall::BeginExceptionBlock(NativeLabel(0)),
        ]
    );
    assert!(trace.starts_with("\nentry:\n--BeginExceptionBlock--\nldarg.0\n"));
    assert!(trace.ends_with("--EndExceptionBlock--\nldloc result\nret\n"));

    let len = buffer.len();
    assert_eq!(backend.code_len(), buffer.cumulative_length(len).unwrap());
}

#[test]
fn test_same_buffer_flushes_into_two_backends() {
    let (buffer, _) = guarded_divide();
    let mut first = RecordingBackend::new();
    let mut second = RecordingBackend::new();

    let first_trace = buffer.flush(&mut first);
    let second_trace = buffer.flush(&mut second);

    assert_eq!(first_trace, second_trace);
    assert_eq!(first.calls(), second.calls());
    assert_ne!(first.target(), second.target());
}
