/*
  Copyright© 2023 Raúl Wolters(1)

  This file is part of rustronomy-labels.

  rustronomy is free software: you can redistribute it and/or modify it under
  the terms of the European Union Public License version 1.2 or later, as
  published by the European Commission.

  rustronomy is distributed in the hope that it will be useful, but WITHOUT ANY
  WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
  A PARTICULAR PURPOSE. See the European Union Public License for more details.

  You should have received a copy of the EUPL in an/all official language(s) of
  the European Union along with rustronomy.  If not, see
  <https://ec.europa.eu/info/european-union-public-licence_en/>.

  (1) Resident of the Kingdom of the Netherlands; agreement between licensor and
  licensee subject to Dutch law as per article 15 of the EUPL.
*/

use rand::Rng;
use rustronomy_labels::prelude::*;

#[test]
fn empty_after_construction() {
  for (min, max) in [(0, 0), (0, 255), (-10, 10), (100, 101)] {
    let mut queue = HierarchicalQueue::new(min, max).unwrap();
    assert_eq!(queue.level_count(), (max - min + 1) as usize);
    assert_eq!(queue.current_level(), queue.level_count() - 1);
    assert!(!queue.has_next());

    queue.add(42, min).unwrap();
    assert!(queue.has_next());
    assert_eq!(queue.next(), Ok(42));
  }
}

#[test]
fn range_accessors() {
  let mut queue = HierarchicalQueue::new(-3, 12).unwrap();
  assert_eq!(queue.min_value(), -3);
  assert_eq!(queue.max_value(), 12);
  assert_eq!(queue.level_count(), 16);
  assert_eq!(queue.current_value(), 12);

  queue.add(0, 5).unwrap();
  assert!(queue.has_next());
  assert_eq!(queue.current_level(), 8);
  assert_eq!(queue.current_value(), 5);
}

#[test]
fn wide_ranges_are_rejected() {
  let limit = rustronomy_labels::MAX_LEVEL_COUNT;
  assert_eq!(
    HierarchicalQueue::new(i64::MIN, i64::MAX).unwrap_err(),
    LabelError::TooManyLevels { min: i64::MIN, max: i64::MAX, limit }
  );
  assert_eq!(
    HierarchicalQueue::new(0, 1 << 34).unwrap_err(),
    LabelError::TooManyLevels { min: 0, max: 1 << 34, limit }
  );
}

#[test]
fn invalid_range() {
  assert_eq!(HierarchicalQueue::new(5, 4).unwrap_err(), LabelError::InvalidRange { min: 5, max: 4 });
}

#[test]
fn out_of_range() {
  let mut queue = HierarchicalQueue::new(10, 20).unwrap();
  assert_eq!(queue.add(0, 9), Err(LabelError::OutOfRange { value: 9, min: 10, max: 20 }));
  assert_eq!(queue.add(0, 21), Err(LabelError::OutOfRange { value: 21, min: 10, max: 20 }));
  assert_eq!(queue.add_checked(0, 21), Err(LabelError::OutOfRange { value: 21, min: 10, max: 20 }));
  assert!(queue.is_empty());
}

#[test]
fn empty_queue_error() {
  let mut queue = HierarchicalQueue::new(0, 3).unwrap();
  assert!(!queue.has_next());
  assert_eq!(queue.next(), Err(LabelError::EmptyQueue));
}

#[test]
fn fifo_within_level() {
  let mut queue = HierarchicalQueue::new(0, 10).unwrap();
  queue.add(1, 5).unwrap();
  queue.add(2, 5).unwrap();
  queue.add(3, 5).unwrap();
  assert!(queue.has_next());
  assert_eq!(queue.next(), Ok(1));

  //Adding more at the same level does not overtake older elements
  queue.add(4, 5).unwrap();
  assert_eq!(queue.by_ref().collect::<Vec<_>>(), vec![2, 3, 4]);
}

#[test]
fn level_major_order() {
  let mut queue = HierarchicalQueue::new(0, 255).unwrap();
  queue.add(100, 100).unwrap();
  queue.add(50, 50).unwrap();
  queue.add(200, 200).unwrap();
  queue.add(201, 200).unwrap();
  queue.add(0, 0).unwrap();
  assert_eq!(queue.collect::<Vec<_>>(), vec![200, 201, 100, 50, 0]);
}

#[test]
fn current_level_never_increases() {
  let mut rng = rand::thread_rng();
  let mut queue = HierarchicalQueue::new(0, 63).unwrap();
  for idx in 0..500 {
    queue.add(idx, rng.gen_range(0..64)).unwrap();
  }

  let mut last = queue.current_level();
  let mut drained = 0;
  while queue.has_next() {
    assert!(queue.current_level() <= last);
    last = queue.current_level();
    queue.next().unwrap();
    drained += 1;

    //Keep feeding the queue at or below the cursor, like a flood would
    if drained % 3 == 0 {
      let level = rng.gen_range(0..=queue.current_level()) as i64;
      queue.add_checked(1000 + drained, level).unwrap();
    }
  }
  assert!(queue.is_empty());
  assert_eq!(queue.current_level(), 0);
}

#[test]
fn passed_levels_are_unreachable() {
  let mut queue = HierarchicalQueue::new(0, 9).unwrap();
  queue.add(1, 8).unwrap();
  queue.add(2, 3).unwrap();
  assert!(queue.has_next());
  assert_eq!(queue.next(), Ok(1));
  assert!(queue.has_next());
  assert_eq!(queue.current_level(), 3);

  //Level 7 lies above the cursor: the element is stored, but never returned
  queue.add(3, 7).unwrap();
  assert_eq!(queue.len(), 2);
  let rest: Vec<usize> = queue.by_ref().collect();
  assert_eq!(rest, vec![2]);
  assert!(!queue.has_next());
  assert_eq!(queue.len(), 1);
}

#[test]
fn checked_add_rejects_passed_levels() {
  let mut queue = HierarchicalQueue::new(0, 9).unwrap();
  queue.add_checked(1, 4).unwrap();
  assert!(queue.has_next());
  assert_eq!(queue.add_checked(2, 5), Err(LabelError::LevelPassed { level: 5, current: 4 }));
  queue.add_checked(3, 4).unwrap();
  assert_eq!(queue.collect::<Vec<_>>(), vec![1, 3]);
}
