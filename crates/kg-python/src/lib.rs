use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};

use kg_params::{Edits, LayerLayout, LayerStack, ParamEstimator};
use kg_types::{ConfigNode, Mapping, ParamError, Scalar, ABSENT};

/// KerasGalaxy Python module
#[pymodule]
fn keras_galaxy(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("SEPARATOR", kg_params::SEPARATOR)?;
    m.add_class::<PyLayerStack>()?;
    Ok(())
}

fn param_error(err: ParamError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn scalar_to_py<'py>(py: Python<'py>, scalar: &Scalar) -> PyResult<Bound<'py, PyAny>> {
    Ok(match scalar {
        Scalar::Null => py.None().into_bound(py),
        Scalar::Bool(b) => PyBool::new(py, *b).to_owned().into_any(),
        Scalar::Int(v) => v.into_pyobject(py)?.into_any(),
        Scalar::Float(v) => PyFloat::new(py, *v).into_any(),
        Scalar::Str(s) => PyString::new(py, s).into_any(),
        Scalar::Tuple(items) => {
            let items = items
                .iter()
                .map(|item| scalar_to_py(py, item))
                .collect::<PyResult<Vec<_>>>()?;
            PyTuple::new(py, items)?.into_any()
        }
    })
}

/// Python view of a tree: dicts, lists, tuples and plain scalars.
fn node_to_py<'py>(py: Python<'py>, node: &ConfigNode) -> PyResult<Bound<'py, PyAny>> {
    match node {
        ConfigNode::Mapping(map) => {
            let dict = PyDict::new(py);
            for (key, value) in map {
                dict.set_item(key, node_to_py(py, value)?)?;
            }
            Ok(dict.into_any())
        }
        ConfigNode::Sequence(items) => {
            let list = PyList::empty(py);
            for item in items {
                list.append(node_to_py(py, item)?)?;
            }
            Ok(list.into_any())
        }
        ConfigNode::Leaf(scalar) => scalar_to_py(py, scalar),
    }
}

fn scalar_from_py(obj: &Bound<'_, PyAny>) -> PyResult<Scalar> {
    match node_from_py(obj)? {
        ConfigNode::Leaf(scalar) => Ok(scalar),
        other => Err(PyTypeError::new_err(format!(
            "tuple items must be scalars, found {}",
            other.kind()
        ))),
    }
}

fn node_from_py(obj: &Bound<'_, PyAny>) -> PyResult<ConfigNode> {
    if obj.is_none() {
        return Ok(ABSENT);
    }
    // bool before int: Python bools are ints.
    if let Ok(b) = obj.downcast::<PyBool>() {
        return Ok(b.is_true().into());
    }
    if obj.is_instance_of::<PyInt>() {
        return Ok(obj.extract::<i64>()?.into());
    }
    if let Ok(f) = obj.downcast::<PyFloat>() {
        return Ok(f.value().into());
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(obj.extract::<String>()?.into());
    }
    if let Ok(tuple) = obj.downcast::<PyTuple>() {
        let items = tuple.iter().map(|item| scalar_from_py(&item)).collect::<PyResult<Vec<_>>>()?;
        return Ok(ConfigNode::Leaf(Scalar::Tuple(items)));
    }
    if let Ok(list) = obj.downcast::<PyList>() {
        let items = list.iter().map(|item| node_from_py(&item)).collect::<PyResult<Vec<_>>>()?;
        return Ok(ConfigNode::Sequence(items));
    }
    if let Ok(dict) = obj.downcast::<PyDict>() {
        let mut map = Mapping::new();
        for (key, value) in dict.iter() {
            map.insert(key.extract::<String>()?, node_from_py(&value)?);
        }
        return Ok(ConfigNode::Mapping(map));
    }
    Err(PyTypeError::new_err(format!(
        "cannot store {} in a layer config",
        obj.get_type().name()?
    )))
}

/// Layer stack with flat get_params/set_params access
#[pyclass(name = "LayerStack", module = "keras_galaxy")]
struct PyLayerStack {
    inner: LayerStack,
}

#[pymethods]
impl PyLayerStack {
    #[new]
    #[pyo3(signature = (config, model_type = "sequential"))]
    fn new(config: &Bound<'_, PyAny>, model_type: &str) -> PyResult<Self> {
        let layout: LayerLayout = model_type.parse().map_err(param_error)?;
        Ok(Self {
            inner: LayerStack::new(node_from_py(config)?, layout),
        })
    }

    fn get_params<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        for (key, node) in self.inner.get_params().map_err(param_error)? {
            dict.set_item(key, node_to_py(py, &node)?)?;
        }
        Ok(dict)
    }

    /// Applies keyword edits in order; `None` on a layer key removes the layer.
    #[pyo3(signature = (**params))]
    fn set_params<'py>(
        mut slf: PyRefMut<'py, Self>,
        params: Option<&Bound<'py, PyDict>>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        let mut edits = Edits::new();
        if let Some(params) = params {
            for (key, value) in params.iter() {
                edits.insert(key.extract::<String>()?, node_from_py(&value)?);
            }
        }
        slf.inner.set_params(edits).map_err(param_error)?;
        Ok(slf)
    }

    #[pyo3(name = "clone")]
    fn clone_stack(&self) -> Self {
        Self {
            inner: self.inner.clone_estimator(),
        }
    }

    fn __copy__(&self) -> Self {
        self.clone_stack()
    }

    fn __deepcopy__(&self, _memo: &Bound<'_, PyAny>) -> Self {
        self.clone_stack()
    }

    fn to_json(&self) -> PyResult<String> {
        self.inner.to_json().map_err(param_error)
    }

    #[getter]
    fn config<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyAny>> {
        node_to_py(py, self.inner.tree())
    }

    #[getter]
    fn model_type(&self) -> &'static str {
        self.inner.layout().as_str()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "LayerStack(name={:?}, layers={}, model_type='{}')",
            self.inner.name().unwrap_or_default(),
            self.inner.len(),
            self.inner.layout().as_str()
        )
    }
}
