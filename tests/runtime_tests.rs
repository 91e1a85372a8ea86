mod common;

#[cfg(test)]
mod tests {
    use crate::common::{compile, fixture, instantiate};
    use rand::Rng;
    use rstest::rstest;

    #[test]
    fn test_add() {
        let (mut store, instance) = instantiate(&fixture("add").bytes());
        let add = instance.get_typed_func::<(i32, i32), i32>(&store, "add").unwrap();
        assert_eq!(add.call(&mut store, (20, 22)).unwrap(), 42);

        let mut rng = rand::rng();
        for _ in 0..50 {
            let (a, b) = (rng.random::<i32>(), rng.random::<i32>());
            assert_eq!(add.call(&mut store, (a, b)).unwrap(), a.wrapping_add(b));
        }
    }

    #[rstest]
    #[case(-5, 5)]
    #[case(7, 7)]
    #[case(0, 0)]
    fn test_flat_if_else(#[case] input: i32, #[case] expected: i32) {
        let (mut store, instance) = instantiate(&fixture("flat_if_else").bytes());
        let abs = instance.get_typed_func::<i32, i32>(&store, "abs").unwrap();
        assert_eq!(abs.call(&mut store, input).unwrap(), expected);
    }

    #[test]
    fn test_call_indirect_through_table() {
        let (mut store, instance) = instantiate(&fixture("call_indirect").bytes());
        let run = instance.get_typed_func::<i32, i32>(&store, "run").unwrap();
        assert_eq!(run.call(&mut store, 21).unwrap(), 42);
    }

    #[test]
    fn test_data_segment_initialises_memory() {
        let (store, instance) = instantiate(&fixture("memory_data").bytes());
        let memory = instance.get_memory(&store, "mem").unwrap();
        assert_eq!(&memory.data(&store)[8..11], b"hi\0");
    }

    #[test]
    fn test_forward_reference_call() {
        let bytes = compile(
            r#"(module
                (func (export "get") (result i32) (call $later))
                (func $later (result i32) (i32.const 42)))"#,
        );
        let (mut store, instance) = instantiate(&bytes);
        let get = instance.get_typed_func::<(), i32>(&store, "get").unwrap();
        assert_eq!(get.call(&mut store, ()).unwrap(), 42);
    }

    #[test]
    fn test_recursive_factorial() {
        let bytes = compile(
            r#"(module
                (func $fac (export "fac") (param $n i64) (result i64)
                    (if (result i64) (i64.eqz (local.get $n))
                        (then (i64.const 1))
                        (else
                            (i64.mul
                                (local.get $n)
                                (call $fac (i64.sub (local.get $n) (i64.const 1))))))))"#,
        );
        let (mut store, instance) = instantiate(&bytes);
        let fac = instance.get_typed_func::<i64, i64>(&store, "fac").unwrap();
        assert_eq!(fac.call(&mut store, 0).unwrap(), 1);
        assert_eq!(fac.call(&mut store, 20).unwrap(), 2_432_902_008_176_640_000);
    }

    #[test]
    fn test_mutable_global() {
        let bytes = compile(
            r#"(module
                (global $count (mut i32) (i32.const 0))
                (func (export "bump") (result i32)
                    (global.set $count (i32.add (global.get $count) (i32.const 1)))
                    (global.get $count)))"#,
        );
        let (mut store, instance) = instantiate(&bytes);
        let bump = instance.get_typed_func::<(), i32>(&store, "bump").unwrap();
        assert_eq!(bump.call(&mut store, ()).unwrap(), 1);
        assert_eq!(bump.call(&mut store, ()).unwrap(), 2);
    }

    #[test]
    fn test_start_function_calls_import() {
        let bytes = compile(
            r#"(module
                (import "env" "log" (func $log (param i32)))
                (func $main (local $i i32)
                    (loop $continue
                        (call $log (local.get $i))
                        (br_if $continue
                            (i32.lt_u
                                (local.tee $i (i32.add (local.get $i) (i32.const 1)))
                                (i32.const 3)))))
                (start $main))"#,
        );
        let (store, _) = instantiate(&bytes);
        assert_eq!(store.data(), &vec![0, 1, 2]);
    }

    #[rstest]
    #[case(0, 100)]
    #[case(1, 101)]
    #[case(2, 102)]
    #[case(99, 102)]
    fn test_br_table_dispatch(#[case] input: i32, #[case] expected: i32) {
        let bytes = compile(
            r#"(module
                (func (export "classify") (param i32) (result i32)
                    (block $default
                        (block $one
                            (block $zero
                                (br_table $zero $one $default (local.get 0)))
                            (return (i32.const 100)))
                        (return (i32.const 101)))
                    (i32.const 102)))"#,
        );
        let (mut store, instance) = instantiate(&bytes);
        let classify = instance.get_typed_func::<i32, i32>(&store, "classify").unwrap();
        assert_eq!(classify.call(&mut store, input).unwrap(), expected);
    }

    #[test]
    fn test_memory_store_and_load() {
        let bytes = compile(
            r#"(module
                (memory (export "mem") 1)
                (func (export "roundtrip") (param $v i64) (result i64)
                    (i64.store offset=16 (i32.const 0) (local.get $v))
                    (i64.load offset=8 (i32.const 8))))"#,
        );
        let (mut store, instance) = instantiate(&bytes);
        let roundtrip = instance.get_typed_func::<i64, i64>(&store, "roundtrip").unwrap();
        assert_eq!(roundtrip.call(&mut store, -12345).unwrap(), -12345);
    }

    #[test]
    fn test_float_constants() {
        let bytes = compile(
            r#"(module
                (func (export "f") (result f64) (f64.add (f64.const 0x1.8p1) (f64.const 1.5)))
                (func (export "inf") (result f32) (f32.const -inf)))"#,
        );
        let (mut store, instance) = instantiate(&bytes);
        let f = instance.get_typed_func::<(), f64>(&store, "f").unwrap();
        assert_eq!(f.call(&mut store, ()).unwrap(), 4.5);
        let inf = instance.get_typed_func::<(), f32>(&store, "inf").unwrap();
        assert_eq!(inf.call(&mut store, ()).unwrap(), f32::NEG_INFINITY);
    }
}
