use crate::common::RawDetection;

pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
    fn class_id(&self) -> usize;
}

impl Nms for RawDetection {
    fn iou(&self, other: &Self) -> f32 {
        self.bbox.iou(&other.bbox)
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }

    fn class_id(&self) -> usize {
        self.class_id
    }
}

/// Sorts `boxes` by descending confidence, then drops every box that
/// overlaps a higher scoring box of the same class by more than `iou_threshold`.
pub fn nms<T: Nms>(boxes: &mut Vec<T>, iou_threshold: f32) {
    sort_by_confidence(boxes);
    let mut current_index = 0;
    for index in 0..boxes.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if boxes[prev_index].class_id() != boxes[index].class_id() {
                continue;
            }
            let iou = boxes[prev_index].iou(&boxes[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            boxes.swap(current_index, index);
            current_index += 1;
        }
    }
    boxes.truncate(current_index);
}

pub fn sort_by_confidence<T: Nms>(boxes: &mut [T]) {
    boxes.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DetectionBox;

    fn raw(class_id: usize, confidence: f32, x1: f32) -> RawDetection {
        RawDetection::new(class_id, confidence, DetectionBox::new(x1, 0., x1 + 10., 10.))
    }

    #[test]
    fn suppresses_overlapping_boxes_of_one_class() {
        let mut boxes = vec![raw(0, 0.6, 1.), raw(0, 0.9, 0.), raw(0, 0.5, 50.)];
        nms(&mut boxes, 0.7);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].confidence, 0.9);
        assert_eq!(boxes[1].confidence, 0.5);
    }

    #[test]
    fn keeps_overlapping_boxes_of_different_classes() {
        let mut boxes = vec![raw(0, 0.9, 0.), raw(3, 0.8, 0.)];
        nms(&mut boxes, 0.7);
        assert_eq!(boxes.len(), 2);
    }

    #[test]
    fn threshold_is_strict() {
        // identical boxes have IoU 1.0
        let mut boxes = vec![raw(1, 0.9, 0.), raw(1, 0.8, 0.)];
        nms(&mut boxes, 1.0);
        assert_eq!(boxes.len(), 2);
    }
}
