//! YOLO export flavours and the output tensor layout each one produces.

use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVersion {
    YoloV5,
    #[default] YoloV8,
    YoloV10,
    YoloV11,
}

impl ModelVersion {
    pub fn name(&self) -> &'static str {
        match self {
            Self::YoloV5 => "YoloV5",
            Self::YoloV8 => "YoloV8",
            Self::YoloV10 => "YoloV10",
            Self::YoloV11 => "YoloV11",
        }
    }

    pub fn parse(version: &str) -> Option<ModelVersion> {
        match version.to_lowercase().trim_start_matches("yolo") {
            "v5" | "5" => Some(ModelVersion::YoloV5),
            "v8" | "8" => Some(ModelVersion::YoloV8),
            "v10" | "10" => Some(ModelVersion::YoloV10),
            "v11" | "11" => Some(ModelVersion::YoloV11),
            _ => None,
        }
    }

    pub fn layout(&self) -> YoloPreds {
        match self {
            Self::YoloV5 => YoloPreds::n_a_cxcywh_confclss(),
            Self::YoloV8 | Self::YoloV11 => YoloPreds::n_cxcywh_clss_a(),
            Self::YoloV10 => YoloPreds::n_a_xyxy_confcls().apply_nms(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoxType {
    Cxcywh,
    Xyxy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClssType {
    /// one score per class
    Clss,
    /// objectness followed by one score per class
    ConfClss,
    /// best score followed by class id
    ConfCls,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloPreds {
    pub clss: ClssType,
    pub bbox: BoxType,
    pub anchors_first: bool,
    pub apply_nms: bool,
}

/// Column views into one image's predictions, one row per anchor.
pub struct ParsedPreds<'a> {
    pub bboxes: ArrayView2<'a, f32>,
    pub ids: Option<ArrayView2<'a, f32>>,
    pub clss: ArrayView2<'a, f32>,
    pub confs: Option<ArrayView2<'a, f32>>,
}

impl YoloPreds {
    pub fn apply_nms(mut self, x: bool) -> Self {
        self.apply_nms = x;
        self
    }

    pub fn n_a_cxcywh_confclss() -> Self {
        // YOLOv5 : NACxcywhConfClss
        Self {
            bbox: BoxType::Cxcywh,
            clss: ClssType::ConfClss,
            anchors_first: true,
            apply_nms: true,
        }
    }

    pub fn n_cxcywh_clss_a() -> Self {
        // YOLOv8 | YOLOv11 : NCxcywhClssA
        Self {
            bbox: BoxType::Cxcywh,
            clss: ClssType::Clss,
            anchors_first: false,
            apply_nms: true,
        }
    }

    pub fn n_a_xyxy_confcls() -> Self {
        // YOLOv10 : NAXyxyConfCls
        Self {
            bbox: BoxType::Xyxy,
            clss: ClssType::ConfCls,
            anchors_first: true,
            apply_nms: true,
        }
    }

    /// Number of values each anchor row must carry for `nc` classes.
    pub fn row_width(&self, nc: usize) -> usize {
        match self.clss {
            ClssType::Clss => 4 + nc,
            ClssType::ConfClss => 5 + nc,
            ClssType::ConfCls => 6,
        }
    }

    /// Splits a single image's prediction matrix into its columns.
    ///
    /// `x` is `[anchors, values]` when anchors come first, otherwise
    /// `[values, anchors]`. Returns `None` when the matrix is narrower than
    /// the layout needs.
    pub fn parse_preds<'a>(&self, x: ArrayView2<'a, f32>, nc: usize) -> Option<ParsedPreds<'a>> {
        let x = if self.anchors_first { x } else { x.reversed_axes() };
        if x.ncols() < self.row_width(nc) {
            return None;
        }

        let (bboxes, rest) = x.split_at(Axis(1), 4);
        let parsed = match self.clss {
            ClssType::ConfClss => {
                let (confs, rest) = rest.split_at(Axis(1), 1);
                let (clss, _) = rest.split_at(Axis(1), nc);
                ParsedPreds { bboxes, ids: None, clss, confs: Some(confs) }
            }
            ClssType::ConfCls => {
                let (clss, rest) = rest.split_at(Axis(1), 1);
                let (ids, _) = rest.split_at(Axis(1), 1);
                ParsedPreds { bboxes, ids: Some(ids), clss, confs: None }
            }
            ClssType::Clss => {
                let (clss, _) = rest.split_at(Axis(1), nc);
                ParsedPreds { bboxes, ids: None, clss, confs: None }
            }
        };
        Some(parsed)
    }
}
