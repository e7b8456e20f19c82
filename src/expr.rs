//! Earth Engine expression graphs as accepted by `value:compute`.
//!
//! A graph is a single value node. Nested calls are inlined, never shared
//! by reference.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueNode {
    ConstantValue(Value),
    FunctionInvocationValue(FunctionInvocation),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocation {
    pub function_name: String,
    pub arguments: BTreeMap<String, ValueNode>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Expression {
    pub values: BTreeMap<String, ValueNode>,
    pub result: String,
}

impl Expression {
    pub fn new(root: ValueNode) -> Self {
        let mut values = BTreeMap::new();
        values.insert("0".to_string(), root);
        Self {
            values,
            result: "0".to_string(),
        }
    }
}

pub fn constant<V: Into<Value>>(value: V) -> ValueNode {
    ValueNode::ConstantValue(value.into())
}

pub fn invoke<'a, I>(function_name: &str, arguments: I) -> ValueNode
where
    I: IntoIterator<Item = (&'a str, ValueNode)>,
{
    ValueNode::FunctionInvocationValue(FunctionInvocation {
        function_name: function_name.to_string(),
        arguments: arguments
            .into_iter()
            .map(|(name, node)| (name.to_string(), node))
            .collect(),
    })
}

impl ValueNode {
    /// Name of the outermost function, if any. Used for logging.
    pub fn function_name(&self) -> Option<&str> {
        match self {
            ValueNode::FunctionInvocationValue(call) => Some(call.function_name.as_str()),
            ValueNode::ConstantValue(_) => None,
        }
    }
}

// Builders for the handful of algorithms the aggregator needs.

pub fn point(lat: f64, lon: f64) -> ValueNode {
    invoke("GeometryConstructors.Point", [("coordinates", constant(vec![lon, lat]))])
}

pub fn buffer(geometry: ValueNode, distance_m: f64) -> ValueNode {
    invoke("Geometry.buffer", [("geometry", geometry), ("distance", constant(distance_m))])
}

pub fn load_collection(id: &str) -> ValueNode {
    invoke("ImageCollection.load", [("id", constant(id))])
}

pub fn first(collection: ValueNode) -> ValueNode {
    invoke("Collection.first", [("collection", collection)])
}

/// Images whose `system:time_start` lies in `[start, end)`.
pub fn filter_date(collection: ValueNode, start: &str, end: &str) -> ValueNode {
    let range = invoke("DateRange", [("start", constant(start)), ("end", constant(end))]);
    let filter = invoke(
        "Filter.dateRangeContains",
        [("leftValue", range), ("rightField", constant("system:time_start"))],
    );
    invoke("Collection.filter", [("collection", collection), ("filter", filter)])
}

pub fn filter_equals<V: Into<Value>>(collection: ValueNode, field: &str, value: V) -> ValueNode {
    let filter = invoke(
        "Filter.equals",
        [("leftField", constant(field)), ("rightValue", constant(value))],
    );
    invoke("Collection.filter", [("collection", collection), ("filter", filter)])
}

pub fn mean(collection: ValueNode) -> ValueNode {
    invoke("reduce.mean", [("collection", collection)])
}

pub fn mosaic(collection: ValueNode) -> ValueNode {
    invoke("ImageCollection.mosaic", [("collection", collection)])
}

pub fn select(image: ValueNode, band: &str) -> ValueNode {
    invoke("Image.select", [("input", image), ("bandSelectors", constant(vec![band]))])
}

pub fn eq_constant(image: ValueNode, value: f64) -> ValueNode {
    let rhs = invoke("Image.constant", [("value", constant(value))]);
    invoke("Image.eq", [("image1", image), ("image2", rhs)])
}

pub fn clip(image: ValueNode, geometry: ValueNode) -> ValueNode {
    invoke("Image.clip", [("input", image), ("geometry", geometry)])
}

/// Circular max filter with a radius in meters.
pub fn focal_max(image: ValueNode, radius_m: f64) -> ValueNode {
    invoke(
        "Image.focal_max",
        [
            ("image", image),
            ("radius", constant(radius_m)),
            ("kernelType", constant("circle")),
            ("units", constant("meters")),
        ],
    )
}

pub fn update_mask(image: ValueNode, mask: ValueNode) -> ValueNode {
    invoke("Image.updateMask", [("image", image), ("mask", mask)])
}

pub fn pixel_area() -> ValueNode {
    invoke("Image.pixelArea", [])
}

pub fn reduce_region_sum(
    image: ValueNode,
    geometry: ValueNode,
    scale_m: f64,
    max_pixels: f64,
) -> ValueNode {
    invoke(
        "Image.reduceRegion",
        [
            ("image", image),
            ("reducer", invoke("Reducer.sum", [])),
            ("geometry", geometry),
            ("scale", constant(scale_m)),
            ("maxPixels", constant(max_pixels)),
        ],
    )
}
