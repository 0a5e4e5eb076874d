pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod region;
    pub mod video_metadata;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod classification {
    pub mod domain {
        pub mod mask_classifier;
        pub mod mask_verdict;
    }
    pub mod infrastructure;
}

pub mod annotation {
    pub mod domain {
        pub mod frame_annotator;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod video_reader;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod camera_stream_use_case;
    pub mod detect_masks_use_case;
    pub mod detection_settings;
    pub mod model_loading;
}
