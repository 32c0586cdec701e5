//! Names of the classes and data types served by FilmLight applications.
//!
//! Used by [`TypeRegistry::builtin`](super::TypeRegistry::builtin).

/// Classes whose instances are handed out as remote-object handles.
pub const PROXY_CLASSES: &[&str] = &[
    "APITest",
    "Application",
    "AudioSync",
    "ClientViewManager",
    "CurrentGrade",
    "Cursor",
    "Diagnostics",
    "DynamicDialog",
    "Export",
    "Filesystem",
    "Format",
    "FormatBurnin",
    "FormatSet",
    "Image",
    "ImageSearcher",
    "JobManager",
    "Licence",
    "Mark",
    "Menu",
    "MenuItem",
    "MultiPaste",
    "ProgressDialog",
    "QueueManager",
    "RenderProcessor",
    "RenderSetup",
    "Scene",
    "SceneSettings",
    "SequenceDescriptor",
    "Shot",
    "SystemInfo",
    "ThumbnailManager",
    "Timer",
    "Utilities",
    "Volumes",
    "WebConfig",
];

/// Plain field-carrying data types decoded as [`Record`](crate::types::Record).
pub const RECORD_TYPES: &[&str] = &[
    "APIPermissionInfo",
    "APIUserInfo",
    "AudioSequenceSettings",
    "AudioSyncProgress",
    "AudioSyncSettings",
    "BLGExportSettings",
    "CDLExportSettings",
    "CategoryInfo",
    "ClientViewClientSettings",
    "ClientViewHostUserSettings",
    "ClientViewStreamSettings",
    "ColourSpaceInfo",
    "ConnectionInfo",
    "CubeExportSettings",
    "CustomerInfo",
    "DRTInfo",
    "DecodeParameterChoice",
    "DecodeParameterDefinition",
    "DiagHostResult",
    "DiagInfo",
    "DiagProgress",
    "DiagResult",
    "DialogItem",
    "EnumInfo",
    "ExportOpInfo",
    "ExportProgress",
    "FormatBurninItem",
    "FormatInfo",
    "FormatMapping",
    "FormatMask",
    "FrameRange",
    "KeyTextItem",
    "LicenceItem",
    "LookInfo",
    "MetadataItem",
    "MetadataProperty",
    "MultiPasteSettings",
    "NewSceneOptions",
    "OpenSceneStatus",
    "QueueLogItem",
    "QueueOp",
    "QueueOpStatus",
    "QueueOpTask",
    "Rational",
    "RenderCodecInfo",
    "RenderCodecParameterInfo",
    "RenderCodecParameterValue",
    "RenderDeliverable",
    "RenderFileTypeInfo",
    "RenderOpInfo",
    "RenderProcessorLogItem",
    "RenderStatus",
    "SDKVersion",
    "SceneInfo",
    "ScenePath",
    "SceneSettingDefinition",
    "ShotIndexRange",
    "ShotInfo",
    "StillExportSettings",
    "VolumeInfo",
];
