use std::path::{Path, PathBuf};

use procdata_base::{ErrorKind, Result};
use test_log::test;

use crate::{ColumnType, InputColumn, OutputColumn, OutputTable, Slice, Value, ITER_BATCH};

pub(super) fn put(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub(super) fn ints(vals: &[i32]) -> Vec<u8> {
    vals.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(super) fn offsets(vals: &[u64]) -> Vec<u8> {
    vals.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn some(vals: &[i32]) -> Vec<Option<Value>> {
    vals.iter().map(|v| Some(Value::Int32(*v))).collect()
}

fn strs(vals: &[&str]) -> Vec<Option<Value>> {
    vals.iter().map(|v| Some(Value::from(*v))).collect()
}

/// A one-column output table sized to `size`.
fn output(dir: &Path, ty: ColumnType, nullable: bool, size: i64) -> Result<OutputTable> {
    let nulls = dir.join("out.nulls");
    let var = dir.join("out.var");
    let col = OutputColumn::attach(
        "out",
        ty,
        Some(dir.join("out.data").as_path()),
        nullable.then_some(nulls.as_path()),
        ty.is_var().then_some(var.as_path()),
    )?;
    let mut table = OutputTable::new("t", vec![col]);
    table.set_size(size)?;
    Ok(table)
}

#[test]
fn test_input_int_reads() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let data = put(dir.path(), "a.data", &ints(&[1, 2, 3]));
    let col = InputColumn::attach("a", ColumnType::Int, Some(data.as_path()), None, None)?;
    assert_eq!(col.name(), "a");
    assert_eq!(col.ty(), ColumnType::Int);
    assert!(!col.is_nullable());
    assert_eq!(col.size(), 3);
    assert_eq!(col.get(0)?, Some(Value::Int32(1)));
    assert_eq!(col.get(-1)?, Some(Value::Int32(3)));
    assert_eq!(col.get(3).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(col.get(-4).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(col.get_slice(..)?, some(&[1, 2, 3]));
    assert_eq!(col.get_slice(Slice::all().with_step(-1))?, some(&[3, 2, 1]));
    assert_eq!(col.get_slice(Slice::new(None, None, 2))?, some(&[1, 3]));
    assert!(col.get_slice(2..2)?.is_empty());
    assert_eq!(col.get_slice(Slice::range(-2, 100))?, some(&[2, 3]));
    Ok(())
}

#[test]
fn test_slice_matches_scalar_reads() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let vals: Vec<i32> = (0..40).map(|i| i * 7 - 100).collect();
    let data = put(dir.path(), "a.data", &ints(&vals));
    let nulls: Vec<u8> = (0..40).map(|i| u8::from(i % 5 == 0)).collect();
    let nulls = put(dir.path(), "a.nulls", &nulls);
    let plain = InputColumn::attach("a", ColumnType::Int, Some(data.as_path()), None, None)?;
    let nullable = InputColumn::attach(
        "b",
        ColumnType::Int,
        Some(data.as_path()),
        Some(nulls.as_path()),
        None,
    )?;
    for col in [&plain, &nullable] {
        for (a, b) in [(0, 40), (3, 17), (39, 40), (10, 11)] {
            let run = col.get_slice(a..b)?;
            assert_eq!(run.len(), b - a);
            for (k, v) in run.iter().enumerate() {
                assert_eq!(*v, col.get((a + k) as i64)?);
            }
        }
    }
    assert_eq!(nullable.get(5)?, None);
    assert_eq!(nullable.get(6)?, Some(Value::Int32(-58)));
    Ok(())
}

#[test]
fn test_null_rows_skip_decoding() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    // An all-zero date does not decode; the null flag must win.
    let data = put(dir.path(), "d.data", &[0; 8]);
    let nulls = put(dir.path(), "d.nulls", &[1, 1]);
    let col = InputColumn::attach(
        "d",
        ColumnType::Date,
        Some(data.as_path()),
        Some(nulls.as_path()),
        None,
    )?;
    assert_eq!(col.get_slice(..)?, vec![None, None]);
    Ok(())
}

#[test]
fn test_input_strings() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let data = put(dir.path(), "s.data", &offsets(&[0, 2, 5, 9]));
    let var = put(dir.path(), "s.var", b"x\0yy\0zzz\0\0");
    let col = InputColumn::attach(
        "s",
        ColumnType::String,
        Some(data.as_path()),
        None,
        Some(var.as_path()),
    )?;
    assert_eq!(col.size(), 4);
    assert_eq!(col.get_slice(..)?, strs(&["x", "yy", "zzz", ""]));
    assert_eq!(col.get(2)?, Some(Value::from("zzz")));
    assert_eq!(col.get_slice(Slice::all().with_step(-2))?, strs(&["", "yy"]));
    Ok(())
}

#[test]
fn test_input_bytes() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let data = put(dir.path(), "b.data", &offsets(&[0, 3, 3]));
    let var = put(dir.path(), "b.var", b"abcde");
    let nulls = put(dir.path(), "b.nulls", &[0, 1, 0]);
    let col = InputColumn::attach(
        "b",
        ColumnType::Bytes,
        Some(data.as_path()),
        Some(nulls.as_path()),
        Some(var.as_path()),
    )?;
    assert_eq!(
        col.get_slice(..)?,
        vec![Some(Value::Bytes(b"abc".to_vec())), None, Some(Value::Bytes(b"de".to_vec()))]
    );
    Ok(())
}

#[test]
fn test_missing_paths() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let empty = InputColumn::attach("e", ColumnType::String, None, None, None)?;
    assert!(empty.is_empty());
    assert_eq!(empty.iter().count(), 0);

    let data = put(dir.path(), "s.data", &offsets(&[0]));
    let e = InputColumn::attach(
        "s",
        ColumnType::String,
        Some(data.as_path()),
        None,
        None,
    )
    .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Format);

    let stray = put(dir.path(), "stray.var", b"zz");
    let data = put(dir.path(), "i.data", &ints(&[4]));
    let col = InputColumn::attach(
        "i",
        ColumnType::Int,
        Some(data.as_path()),
        None,
        Some(stray.as_path()),
    )?;
    assert_eq!(col.get(0)?, Some(Value::Int32(4)));

    let absent = dir.path().join("absent");
    let e = InputColumn::attach(
        "x",
        ColumnType::Int,
        Some(absent.as_path()),
        None,
        None,
    )
    .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Io);
    Ok(())
}

#[test]
fn test_iter_crosses_batches() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let n = ITER_BATCH * 2 + 7;
    let bytes: Vec<u8> = (0..n as i64).flat_map(|v| v.to_le_bytes()).collect();
    let data = put(dir.path(), "l.data", &bytes);
    let col = InputColumn::attach("l", ColumnType::Long, Some(data.as_path()), None, None)?;
    assert_eq!(col.batches().count(), 3);
    let mut expect = 0_i64;
    for val in &col {
        assert_eq!(val?, Some(Value::Int64(expect)));
        expect += 1;
    }
    assert_eq!(expect, n as i64);
    // Restartable.
    assert_eq!(col.iter().count(), n);
    Ok(())
}

#[test]
fn test_output_append_and_set() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut table = output(dir.path(), ColumnType::Int, true, 4)?;
    let col = table.column_mut(0)?;
    assert_eq!(col.size(), 4);
    assert_eq!(col.append(Some(Value::Int32(10)))?, 0);
    assert_eq!(col.append(None)?, 1);
    assert_eq!(col.written(), 2);
    col.set(3, Some(Value::Int32(40)))?;
    col.set(-4, None)?;
    assert_eq!(col.get_slice(..)?, vec![None, None, Some(Value::Int32(0)), Some(Value::Int32(40))]);
    col.set(0, Some(Value::Int8(1)))?;
    assert_eq!(col.get(0)?, Some(Value::Int32(1)));
    assert_eq!(col.set(4, None).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(col.set(0, Some(Value::from("no"))).unwrap_err().kind(), ErrorKind::Type);
    Ok(())
}

#[test]
fn test_output_null_in_non_nullable() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut table = output(dir.path(), ColumnType::Long, false, 2)?;
    let col = table.column_mut(0)?;
    assert_eq!(col.set(0, None).unwrap_err().kind(), ErrorKind::Type);
    assert_eq!(col.append(None).unwrap_err().kind(), ErrorKind::Type);
    assert_eq!(col.written(), 0);
    Ok(())
}

#[test]
fn test_set_slice() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut table = output(dir.path(), ColumnType::Int, true, 5)?;
    let col = table.column_mut(0)?;
    col.set_slice(.., some(&[1, 2, 3, 4, 5]))?;
    col.set_slice(Slice::all().with_step(2), vec![None, Some(Value::Int32(30)), None])?;
    let mut expect = some(&[0, 2, 30, 4, 0]);
    expect[0] = None;
    expect[4] = None;
    assert_eq!(col.get_slice(..)?, expect);

    let before = col.get_slice(..)?;
    let e = col.set_slice(0..2, some(&[9, 9, 9])).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Validation);
    let e = col.set_slice(0..3, some(&[9])).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Validation);
    assert_eq!(col.get_slice(..)?, before);
    Ok(())
}

#[test]
fn test_set_slice_non_nullable() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut table = output(dir.path(), ColumnType::Int, false, 6)?;
    let col = table.column_mut(0)?;
    col.set_slice(.., some(&[0, 0, 0, 0, 0, 0]))?;
    col.set_slice(1..4, some(&[7, 8, 9]))?;
    assert_eq!(col.get_slice(..)?, some(&[0, 7, 8, 9, 0, 0]));
    col.set_slice(Slice::all().with_step(-2), some(&[-1, -3, -5]))?;
    assert_eq!(col.get_slice(..)?, some(&[0, -5, 8, -3, 0, -1]));
    col.set_slice(2..2, Vec::new())?;

    let e = col.set_slice(0..2, vec![Some(Value::Int32(1)), None]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Type);
    let e = col.set_slice(0..1, vec![Some(Value::Int64(1 << 40))]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Type);
    assert_eq!(col.get(0)?, Some(Value::Int32(0)));
    Ok(())
}

#[test]
fn test_capacity_and_partial_extend() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut table = output(dir.path(), ColumnType::Int, false, 3)?;
    let col = table.column_mut(0)?;
    assert_eq!(col.extend(some(&[1, 2]))?, 2);
    let e = col.extend(some(&[3, 4, 5])).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Capacity);
    assert_eq!(col.written(), 3);
    assert_eq!(col.get_slice(..)?, some(&[1, 2, 3]));
    assert_eq!(col.append(Some(Value::Int32(6))).unwrap_err().kind(), ErrorKind::Capacity);

    let dir = tempfile::tempdir().unwrap();
    let mut table = output(dir.path(), ColumnType::Int, false, 3)?;
    let col = table.column_mut(0)?;
    let vals = vec![Some(Value::Int32(1)), Some(Value::from("x")), Some(Value::Int32(3))];
    let e = col.extend(vals).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Type);
    assert_eq!(col.written(), 1);
    Ok(())
}

#[test]
fn test_output_strings() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut table = output(dir.path(), ColumnType::String, true, 4)?;
    {
        let col = table.column_mut(0)?;
        assert_eq!(col.extend(vec![Some(Value::from("a")), None, Some(Value::from("bb"))])?, 3);
        assert_eq!(col.get(0)?, Some(Value::from("a")));
        assert_eq!(col.get(1)?, None);
        assert_eq!(col.get(2)?, Some(Value::from("bb")));
        assert_eq!(col.get(3).unwrap_err().kind(), ErrorKind::Range);
        assert_eq!(col.set(0, Some(Value::from("z"))).unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(col.append(Some(Value::Int32(1))).unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(col.written(), 3);
    }
    table.complete()?;
    drop(table);
    assert_eq!(std::fs::read(dir.path().join("out.var"))?, b"a\0bb\0".to_vec());
    assert_eq!(std::fs::read(dir.path().join("out.data"))?, offsets(&[0, 2, 2, 0]));
    assert_eq!(std::fs::read(dir.path().join("out.nulls"))?, vec![0, 1, 0, 0]);
    Ok(())
}

#[test]
fn test_extend_from_input() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let n = ITER_BATCH + 3;
    let vals: Vec<i32> = (0..n as i32).collect();
    let data = put(dir.path(), "in.data", &ints(&vals));
    let src = InputColumn::attach("in", ColumnType::Int, Some(data.as_path()), None, None)?;
    let mut table = output(dir.path(), ColumnType::Int, false, n as i64)?;
    let col = table.column_mut(0)?;
    assert_eq!(col.extend_from(&src)?, n);
    assert_eq!(col.get_slice(..)?, src.get_slice(..)?);
    Ok(())
}

#[test]
fn test_resize_to_zero() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut table = output(dir.path(), ColumnType::Double, true, 0)?;
    assert_eq!(table.size(), 0);
    let col = table.column_mut(0)?;
    assert!(col.is_empty());
    assert!(col.get_slice(..)?.is_empty());
    assert_eq!(col.append(None).unwrap_err().kind(), ErrorKind::Capacity);
    table.complete()?;
    assert_eq!(std::fs::metadata(dir.path().join("out.data"))?.len(), 0);
    Ok(())
}
