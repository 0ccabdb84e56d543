use procdata_base::ErrorKind;
use test_log::test;

use crate::Slice;

fn rows(slice: Slice, len: usize) -> Vec<usize> {
    slice.resolve(len).unwrap().rows().collect()
}

#[test]
fn test_forward_slices() {
    assert_eq!(rows(Slice::all(), 4), vec![0, 1, 2, 3]);
    assert_eq!(rows(Slice::range(1, 3), 4), vec![1, 2]);
    assert_eq!(rows(Slice::new(Some(-3), None, 1), 10), vec![7, 8, 9]);
    assert_eq!(rows(Slice::new(Some(2), Some(8), 3), 10), vec![2, 5]);
    assert_eq!(rows(Slice::new(Some(-20), Some(2), 1), 10), vec![0, 1]);
    assert_eq!(rows(Slice::new(Some(20), None, 1), 10), Vec::<usize>::new());
    assert_eq!(rows(Slice::range(5, 2), 10), Vec::<usize>::new());
    assert_eq!(rows(Slice::all(), 0), Vec::<usize>::new());
}

#[test]
fn test_backward_slices() {
    assert_eq!(rows(Slice::all().with_step(-1), 3), vec![2, 1, 0]);
    assert_eq!(rows(Slice::all().with_step(-2), 5), vec![4, 2, 0]);
    assert_eq!(rows(Slice::new(Some(20), Some(-20), -3), 5), vec![4, 1]);
    assert_eq!(rows(Slice::new(Some(1), Some(3), -1), 5), Vec::<usize>::new());
    assert_eq!(rows(Slice::new(Some(-1), Some(-3), -1), 5), vec![4, 3]);
}

#[test]
fn test_unit_step_is_a_range() {
    let r = Slice::new(Some(-3), None, 1).resolve(10).unwrap();
    assert_eq!(r.as_range(), Some(7..10));
    assert_eq!(Slice::all().with_step(2).resolve(10).unwrap().as_range(), None);
    assert_eq!(Slice::from(2..4), Slice::range(2, 4));
    assert_eq!(Slice::from(..4), Slice::new(None, Some(4), 1));
    assert_eq!(Slice::from(4..), Slice::new(Some(4), None, 1));
    assert_eq!(Slice::from(..), Slice::all());
}

#[test]
fn test_zero_step() {
    let e = Slice::all().with_step(0).resolve(3).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Validation);
}
